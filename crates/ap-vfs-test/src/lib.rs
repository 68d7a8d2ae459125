//! End-to-end tests for ap-vfs-* crates.

#[cfg(test)]
mod tests {
    use ap_vfs::{BackendId, OpenFlags, Registry, Stat, VfsError, Whence};
    use ap_vfs_compose::MountTable;
    use ap_vfs_host::HostFs;
    use ap_vfs_memory::MemoryFs;
    use ap_vfs_posix as posix;
    use std::sync::{Arc, Mutex, MutexGuard};

    /// Serialize the tests using the process-wide registry.
    static LOCK: Mutex<()> = Mutex::new(());

    fn lock() -> MutexGuard<'static, ()> {
        let _ = env_logger::builder().is_test(true).try_init();
        LOCK.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn memory() -> Arc<MemoryFs> {
        let mem = Arc::new(MemoryFs::new("/mem"));
        mem.add("/mem/a.txt", b"hi").unwrap();
        mem
    }

    fn names(dir: &mut ap_vfs::DirHandle) -> Vec<String> {
        let mut res = Vec::new();
        while let Some(entry) = posix::readdir(dir) {
            res.push(entry.name().to_string());
        }
        res
    }

    #[test]
    fn unknown_path_allocates_nothing() {
        let _guard = lock();
        posix::install(Registry::new());
        posix::add(memory());
        for path in ["/nowhere", "", "mem/a.txt", "/x/mem/a.txt"] {
            assert_eq!(posix::open(path, 0, 0), -1, "{path}");
        }
        assert_eq!(posix::with_registry(|r| r.len()), 0);
        assert_eq!(posix::open("/mem/a.txt", 0, 0), 0);
    }

    #[test]
    fn memory_round_trip() {
        let _guard = lock();
        posix::install(Registry::new());
        posix::add(memory());
        let fd = posix::open("/mem/a.txt", 0, 0);
        assert!(fd >= 0);
        let mut buf = [0u8; 10];
        assert_eq!(posix::read(fd, &mut buf), 2);
        assert_eq!(&buf[..2], b"hi");
        assert_eq!(posix::read(fd, &mut buf), 0);
        assert_eq!(posix::close(fd), 0);
        let mut st = Stat::default();
        assert_eq!(posix::stat("/mem/a.txt", &mut st), 0);
        assert_eq!(st.size, 2);
        assert!(st.is_file());
        assert_eq!(st.mode() & ap_vfs::meta::S_IFMT, ap_vfs::meta::S_IFREG);
    }

    #[test]
    fn lowest_slot_reused() {
        let _guard = lock();
        posix::install(Registry::new());
        let mem = memory();
        mem.add("/mem/b.txt", b"b").unwrap();
        posix::add(mem);
        let first = posix::open("/mem/a.txt", 0, 0);
        let a = posix::open("/mem/a.txt", 0, 0);
        assert_eq!(posix::close(a), 0);
        let b = posix::open("/mem/b.txt", 0, 0);
        assert_eq!(b, a);
        let mut buf = [0u8; 4];
        assert_eq!(posix::read(b, &mut buf), 1);
        assert_eq!(&buf[..1], b"b");
        assert_eq!(posix::read(first, &mut buf), 2);
    }

    #[test]
    fn snapshot_isolation() {
        let _guard = lock();
        posix::install(Registry::new());
        let mem = memory();
        posix::add(mem.clone());
        let mut dir = posix::opendir("/mem").unwrap();
        mem.add("/mem/new.txt", b"new").unwrap();
        assert_eq!(names(&mut dir), ["a.txt"]);
        assert_eq!(posix::closedir(dir), 0);
        let mut dir = posix::opendir("/mem").unwrap();
        assert_eq!(names(&mut dir), ["a.txt", "new.txt"]);
    }

    #[test]
    fn first_prefix_wins() {
        let mut reg = Registry::new();
        let outer = Arc::new(MemoryFs::with_name("/a", "outer"));
        outer.add("/a/b/file", b"outer").unwrap();
        let inner = Arc::new(MemoryFs::with_name("/a/b", "inner"));
        inner.add("/a/b/file", b"inner").unwrap();
        let x = reg.add(outer);
        let y = reg.add(inner);
        assert_eq!(reg.resolve_by_path("/a/b/file"), Some(x));
        assert_eq!(reg.resolve_by_name("inner"), Some(y));
        let fd = reg.open("/a/b/file", OpenFlags::RDONLY).unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(reg.read(fd, &mut buf).unwrap(), 5);
        assert_eq!(&buf[..5], b"outer");
    }

    #[test]
    fn seek_end_then_read() {
        let mut reg = Registry::new();
        reg.add(memory());
        let fd = reg.open("/mem/a.txt", OpenFlags::RDONLY).unwrap();
        assert_eq!(reg.lseek(fd, 0, Whence::End).unwrap(), 2);
        assert_eq!(reg.read(fd, &mut [0u8; 4]).unwrap(), 0);
        assert_eq!(reg.tell(fd).unwrap(), 2);
    }

    #[test]
    fn host_next_to_memory() {
        let _guard = lock();
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("logs")).unwrap();
        let mut reg = Registry::new();
        let mem = reg.add(memory());
        reg.add(Arc::new(HostFs::new("/sd", tmp.path()).with_name("sd")));
        reg.set_default_backend(mem);
        posix::install(reg);

        let flags = OpenFlags::WRONLY | OpenFlags::CREAT | OpenFlags::TRUNC;
        let fd = posix::open("/sd/logs/run.txt", flags.0, 0o644);
        assert!(fd >= 0);
        assert_eq!(posix::write(fd, b"line 1\n"), 7);
        assert_eq!(posix::close(fd), 0);

        let mut log = posix::fopen("/sd/logs/run.txt", "a").unwrap();
        assert_eq!(log.write(b"line 2\n"), 7);
        assert_eq!(log.close(), 0);
        let text = std::fs::read_to_string(tmp.path().join("logs/run.txt")).unwrap();
        assert_eq!(text, "line 1\nline 2\n");

        let mut st = Stat::default();
        assert_eq!(posix::stat("/sd/logs", &mut st), 0);
        assert!(st.is_dir());
        let mut dir = posix::opendir("/sd/logs").unwrap();
        assert_eq!(names(&mut dir), ["run.txt"]);
        assert_eq!(posix::closedir(dir), 0);

        // directory handles carry their backend
        let mut mem_dir = posix::opendir("/mem").unwrap();
        let mut sd_dir = posix::opendir("/sd").unwrap();
        assert_eq!(names(&mut sd_dir), ["logs"]);
        assert_eq!(names(&mut mem_dir), ["a.txt"]);

        assert_eq!(posix::unlink("/mem/a.txt"), -1);
        assert_eq!(posix::unlink("/sd/logs/run.txt"), 0);
        assert!(!tmp.path().join("logs/run.txt").exists());
        assert!(posix::mem_map("/sd/logs").is_none());
        assert_eq!(posix::mem_map("/mem/a.txt"), Some(&b"hi"[..]));
    }

    #[test]
    fn update_in_place() {
        let _guard = lock();
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("cfg.txt"), "keep me").unwrap();
        let mut reg = Registry::new();
        reg.add(Arc::new(HostFs::new("/sd", tmp.path())));
        posix::install(reg);

        let mut cfg = posix::fopen("/sd/cfg.txt", "r+").unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(cfg.read(&mut buf), 4);
        assert_eq!(&buf, b"keep");
        assert_eq!(cfg.write(b"-"), 1);
        drop(cfg);
        assert_eq!(std::fs::read_to_string(tmp.path().join("cfg.txt")).unwrap(), "keep-me");

        let fd = posix::open("/sd/cfg.txt", OpenFlags::RDWR.0, 0);
        assert_eq!(posix::lseek(fd, 0, posix::SEEK_END), 7);
        assert_eq!(posix::close(fd), 0);

        let cfg = posix::fopen("/sd/cfg.txt", "w").unwrap();
        drop(cfg);
        assert_eq!(std::fs::read_to_string(tmp.path().join("cfg.txt")).unwrap(), "");
    }

    #[test]
    fn readonly_host() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("fixed.txt"), "fixed").unwrap();
        let mut reg = Registry::new();
        reg.add(Arc::new(HostFs::new("/ro", tmp.path()).readonly(true)));
        let err = reg.open("/ro/fixed.txt", OpenFlags::RDWR).unwrap_err();
        assert_eq!(VfsError::of(&err), Some(VfsError::ReadOnly));
        let err = reg.unlink("/ro/fixed.txt").unwrap_err();
        assert_eq!(VfsError::of(&err), Some(VfsError::ReadOnly));
        let fd = reg.open("/ro/fixed.txt", OpenFlags::RDONLY).unwrap();
        assert_eq!(reg.fstat(fd).unwrap().size, 5);
        let err = reg.open("/ro/../escape", OpenFlags::RDONLY).unwrap_err();
        assert_eq!(VfsError::of(&err), Some(VfsError::InvalidPath));
    }

    #[test]
    fn composed_from_table() {
        let _guard = lock();
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("card")).unwrap();
        std::fs::write(tmp.path().join("card/notes.txt"), "first\nsecond\n").unwrap();
        let config = tmp.path().join("mounts.json");
        std::fs::write(
            &config,
            r#"{ "mounts": [
                { "type": "memory", "prefix": "/mem", "files": { "/mem/a.txt": "hi", "/mem/etc/motd": "hello" } },
                { "type": "host", "prefix": "/sd", "root": "card" } ] }"#,
        )
        .unwrap();
        MountTable::load(&config).unwrap().install().unwrap();
        assert_eq!(posix::with_registry(|r| r.default_backend()), Some(BackendId(0)));

        let mut notes = posix::fopen("/sd/notes.txt", "r").unwrap();
        let mut line = [0u8; 32];
        assert_eq!(notes.gets(&mut line), Some(&b"first\n"[..]));
        assert_eq!(notes.gets(&mut line), Some(&b"second\n"[..]));
        assert_eq!(notes.gets(&mut line), None);

        // searches outside all prefixes go to the memory mount
        let mut dir = posix::opendir("/").unwrap();
        assert_eq!(names(&mut dir), ["mem/a.txt", "mem/etc/motd"]);
        let mut dir = posix::opendir("/mem/etc").unwrap();
        assert_eq!(names(&mut dir), ["motd"]);
        assert!(posix::opendir("/mem/a.txt").is_none());
    }

    #[test]
    fn zero_length_write_and_blob_write_look_alike() {
        let mut reg = Registry::new();
        reg.add(memory());
        let fd = reg.open("/mem/a.txt", OpenFlags::RDWR).unwrap();
        assert_eq!(reg.write(fd, b"").unwrap(), 0);
        assert_eq!(reg.write(fd, b"xx").unwrap(), 0);
        assert_eq!(reg.mem_map("/mem/a.txt").unwrap(), b"hi");
    }
}

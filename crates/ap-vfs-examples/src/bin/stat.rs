//! Show the metadata of paths in a composed virtual filesystem.

use ap_vfs::{Error, Stat};
use ap_vfs_compose::MountTable;
use gumdrop::Options;

#[derive(Debug, Options)]
struct CommandOptions {
    /// Print the help message.
    help: bool,

    /// The JSON mount table.
    #[options(default = "mounts.json")]
    config: String,

    /// Also list the mounts.
    mounts: bool,

    /// Paths to stat.
    #[options(free)]
    paths: Vec<String>,
}

fn main() -> Result<(), Error> {
    env_logger::init();
    let opts = CommandOptions::parse_args_default_or_exit();
    MountTable::load(&opts.config)?.install()?;
    if opts.mounts {
        ap_vfs_posix::with_registry(|reg| {
            let search = reg.default_backend();
            for (id, backend) in reg.backends() {
                let mark = if Some(id) == search { "*" } else { "" };
                let ro = if backend.is_readonly() { "ro" } else { "rw" };
                println!("{}\t{}\t{ro}{mark}", backend.path_prefix(), backend.name());
            }
        });
    }
    let mut failed = 0;
    for path in &opts.paths {
        let mut st = Stat::default();
        if ap_vfs_posix::stat(path, &mut st) != 0 {
            log::error!("{path}: cannot stat");
            failed += 1;
            continue;
        }
        let typ = if st.is_dir() { "directory" } else { "file" };
        println!("{path}\t{typ}\tsize={}\tmode={:#o}", st.size, st.mode());
    }
    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

//! List directories of a composed virtual filesystem.

use ap_vfs::{msg2err, Error, FileType, Stat};
use ap_vfs_compose::MountTable;
use gumdrop::Options;

#[derive(Debug, Options)]
struct CommandOptions {
    /// Print the help message.
    help: bool,

    /// The JSON mount table.
    #[options(default = "mounts.json")]
    config: String,

    /// Show type and size of the entries.
    long: bool,

    /// Directories to list.
    #[options(free)]
    dirs: Vec<String>,
}

fn join(dir: &str, name: &str) -> String {
    format!("{}/{}", dir.trim_end_matches('/'), name)
}

fn list(opts: &CommandOptions, path: &str) -> Result<(), Error> {
    let mut dir = ap_vfs_posix::opendir(path).ok_or_else(|| msg2err!(format!("cannot open directory {path}")))?;
    while let Some(entry) = ap_vfs_posix::readdir(&mut dir) {
        if !opts.long {
            println!("{}", entry.name());
            continue;
        }
        let mut st = Stat::default();
        let size = match ap_vfs_posix::stat(&join(path, entry.name()), &mut st) {
            0 => st.size.to_string(),
            _ => {
                log::warn!("no size for {} in {path}", entry.name());
                "?".to_string()
            }
        };
        let typ = if entry.typ == FileType::Directory { 'd' } else { '-' };
        println!("{typ} {size:>10} {}", entry.name());
    }
    ap_vfs_posix::closedir(dir);
    Ok(())
}

fn main() -> Result<(), Error> {
    env_logger::init();
    let opts = CommandOptions::parse_args_default_or_exit();
    MountTable::load(&opts.config)?.install()?;
    if opts.dirs.is_empty() {
        return list(&opts, "/");
    }
    for (i, dir) in opts.dirs.iter().enumerate() {
        if opts.dirs.len() > 1 {
            if i > 0 {
                println!();
            }
            println!("{dir}:");
        }
        list(&opts, dir)?;
    }
    Ok(())
}

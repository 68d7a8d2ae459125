//! Print files of a composed virtual filesystem.

use ap_vfs::{msg2err, Error};
use ap_vfs_compose::MountTable;
use gumdrop::Options;
use std::io::Write;

#[derive(Debug, Options)]
struct CommandOptions {
    /// Print the help message.
    help: bool,

    /// The JSON mount table.
    #[options(default = "mounts.json")]
    config: String,

    /// The bytes to skip at the start of each file.
    offset: i64,

    /// Files to print.
    #[options(free)]
    files: Vec<String>,
}

fn main() -> Result<(), Error> {
    env_logger::init();
    let opts = CommandOptions::parse_args_default_or_exit();
    MountTable::load(&opts.config)?.install()?;
    let mut out = std::io::stdout().lock();
    let mut buf = vec![0u8; 4096];
    for path in &opts.files {
        log::debug!("cat {path} from offset {}", opts.offset);
        let mut file = ap_vfs_posix::fopen(path, "r").ok_or_else(|| msg2err!(format!("cannot open {path}")))?;
        if opts.offset != 0 && file.seek(opts.offset, ap_vfs_posix::SEEK_SET) != 0 {
            return Err(msg2err!(format!("cannot seek in {path}")));
        }
        let mut total = 0;
        loop {
            let n = file.read(&mut buf);
            if n == 0 {
                break;
            }
            out.write_all(&buf[..n])?;
            total += n;
        }
        log::debug!("{path}: {total} bytes");
        file.close();
    }
    out.flush()?;
    Ok(())
}

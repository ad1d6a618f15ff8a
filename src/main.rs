//! Interactive shell driving a single mounted v6 image.
//!
//! Each line is a verb followed by whitespace-separated arguments:
//!
//! ```text
//! initfs <image> <fsize> <ninodes>   create and mount a fresh image
//! load <image>                       mount an existing image
//! mkdir <path>                       create a directory, and any missing parents
//! rm <path>                          remove a file or a directory tree
//! cpin <host-file> <v6-path>         import a host file into the image
//! cpout <v6-path> <host-file>        export a file from the image to the host
//! cd <path>                          change the current directory
//! ls                                 list the current directory
//! q                                  flush and exit
//! ```

use std::path::PathBuf;
use std::process::exit;
use v6fs::prompt::prompt;
use v6fs::{Error, FileSystem};

fn print_help() {
    eprintln!("commands:");
    eprintln!("  initfs <image> <fsize> <ninodes>   create and mount a fresh image");
    eprintln!("  load <image>                       mount an existing image");
    eprintln!("  mkdir <path>                        create a directory");
    eprintln!("  rm <path>                           remove a file or directory tree");
    eprintln!("  cpin <host-file> <v6-path>           import a host file");
    eprintln!("  cpout <v6-path> <host-file>          export a file to the host");
    eprintln!("  cd <path>                            change directory");
    eprintln!("  ls                                   list the current directory");
    eprintln!("  q                                    flush and exit");
}

fn handle_cmd(fs: &mut Option<FileSystem>, cmd: &str, args: &[&str]) {
    match cmd {
        "initfs" => {
            let &[image, fsize, ninodes] = args else {
                eprintln!("usage: initfs <image> <fsize> <ninodes>");
                return;
            };
            let fsize: u32 = match fsize.parse() {
                Ok(v) => v,
                Err(_) => {
                    eprintln!("initfs: invalid fsize `{fsize}`");
                    return;
                }
            };
            let ninodes: u32 = match ninodes.parse() {
                Ok(v) => v,
                Err(_) => {
                    eprintln!("initfs: invalid ninodes `{ninodes}`");
                    return;
                }
            };
            if let Some(old) = fs.take() {
                if let Err(e) = old.quit() {
                    eprintln!("error flushing previous image: {e}");
                }
            }
            match FileSystem::format(&PathBuf::from(image), fsize, ninodes) {
                Ok(new_fs) => *fs = Some(new_fs),
                Err(e) => eprintln!("initfs: {e}"),
            }
        }
        "load" => {
            let &[image] = args else {
                eprintln!("usage: load <image>");
                return;
            };
            if let Some(old) = fs.take() {
                if let Err(e) = old.quit() {
                    eprintln!("error flushing previous image: {e}");
                }
            }
            match FileSystem::mount(&PathBuf::from(image)) {
                Ok(new_fs) => *fs = Some(new_fs),
                Err(e) => eprintln!("load: {e}"),
            }
        }
        "mkdir" => with_fs(fs, args, 1, |fs, args| fs.mkdir(args[0])),
        "rm" => with_fs(fs, args, 1, |fs, args| fs.rm(args[0])),
        "cd" => with_fs(fs, args, 1, |fs, args| fs.cd(args[0])),
        "cpin" => with_fs(fs, args, 2, |fs, args| {
            fs.cpin(&PathBuf::from(args[0]), args[1])
        }),
        "cpout" => with_fs(fs, args, 2, |fs, args| {
            fs.cpout(args[0], &PathBuf::from(args[1]))
        }),
        "ls" => {
            let Some(fs) = fs.as_mut() else {
                eprintln!("{}", Error::NotMounted);
                return;
            };
            match fs.ls() {
                Ok(entries) => {
                    for entry in entries {
                        let kind = if entry.is_dir { "dir" } else { "file" };
                        println!("{}\t{kind}\t{}", entry.name, entry.size);
                    }
                }
                Err(e) => eprintln!("ls: {e}"),
            }
        }
        "q" => {
            if let Some(fs) = fs.take() {
                if let Err(e) = fs.quit() {
                    eprintln!("error flushing image: {e}");
                }
            }
            exit(0);
        }
        "help" | "?" => print_help(),
        "" => {}
        _ => eprintln!("{cmd}: unknown command (try `help`)"),
    }
}

/// Runs `op` against the mounted file system, requiring exactly `arity`
/// arguments; reports `Error::NotMounted` and any verb error uniformly.
fn with_fs<'a>(
    fs: &mut Option<FileSystem>,
    args: &[&'a str],
    arity: usize,
    op: impl FnOnce(&mut FileSystem, &[&'a str]) -> Result<(), Error>,
) {
    if args.len() != arity {
        eprintln!("wrong number of arguments (expected {arity})");
        return;
    }
    let Some(fs) = fs.as_mut() else {
        eprintln!("{}", Error::NotMounted);
        return;
    };
    if let Err(e) = op(fs, args) {
        eprintln!("{e}");
    }
}

fn main() {
    let mut fs: Option<FileSystem> = None;
    loop {
        let prompt_str = match &fs {
            Some(fs) => format!("fsaccess {}$ ", fs.cwd()),
            None => "fsaccess$ ".to_string(),
        };
        let Some(line) = prompt(prompt_str, false) else {
            break;
        };
        let mut tokens = line.split_whitespace();
        let Some(cmd) = tokens.next() else {
            continue;
        };
        let args: Vec<&str> = tokens.collect();
        handle_cmd(&mut fs, cmd, &args);
    }
    if let Some(fs) = fs {
        if let Err(e) = fs.quit() {
            eprintln!("error flushing image: {e}");
        }
    }
}

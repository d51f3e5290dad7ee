//! A thin line-oriented REPL wired around `simvfs::FileSystem`, meant as a
//! manual-testing aid. The tokenizer and prompt styling are intentionally
//! minimal — the real shell is an external collaborator.

use std::io::{self, BufRead, Write};

use log::error;
use simvfs::config::DEFAULT_DISK_PATH;
use simvfs::fs::{render_listing, FileSystem, Whence};
use simvfs::{prompt, Error};

fn main() {
    env_logger::init();
    let mut fs = match FileSystem::open_or_format(DEFAULT_DISK_PATH) {
        Ok(fs) => fs,
        Err(e) => {
            eprintln!("simvfs: cannot open disk image: {e}");
            std::process::exit(1);
        }
    };

    loop {
        print!("{}> ", fs.principal().map(|p| p.username.as_str()).unwrap_or("(guest)"));
        let _ = io::stdout().flush();

        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(&cmd) = tokens.first() else { continue };

        match dispatch(&mut fs, cmd, &tokens[1..]) {
            Ok(Some(output)) => println!("{output}"),
            Ok(None) => {}
            Err(e) => {
                error!("{cmd}: {e}");
                println!("{e}");
            }
        }
    }
}

fn usage() -> Error {
    Error::InvalidMode("wrong number of arguments".to_string())
}

fn path_arg<'a>(args: &[&'a str]) -> Result<&'a str, Error> {
    args.first().copied().ok_or_else(usage)
}

fn fd_arg(args: &[&str], idx: usize) -> Result<i64, Error> {
    args.get(idx).and_then(|s| s.parse().ok()).ok_or_else(usage)
}

fn two_paths<'a>(args: &[&'a str]) -> Result<(&'a str, &'a str), Error> {
    match (args.first(), args.get(1)) {
        (Some(&a), Some(&b)) => Ok((a, b)),
        _ => Err(usage()),
    }
}

fn dispatch(fs: &mut FileSystem, cmd: &str, args: &[&str]) -> Result<Option<String>, Error> {
    match cmd {
        "login" => {
            let username = path_arg(args)?;
            let password = prompt::prompt("Password: ", true)?;
            fs.login(username, &password)?;
            Ok(Some(format!("welcome, {username}")))
        }
        "logout" => {
            fs.logout();
            Ok(None)
        }
        "format" => {
            fs.format()?;
            Ok(Some("image reformatted".to_string()))
        }
        "mkdir" => {
            fs.mkdir(path_arg(args)?)?;
            Ok(None)
        }
        "create" => {
            fs.create(path_arg(args)?)?;
            Ok(None)
        }
        "delete" => {
            let recursive = args.contains(&"-r");
            let path = args.iter().copied().find(|a| *a != "-r").ok_or_else(usage)?;
            fs.delete(path, recursive)?;
            Ok(None)
        }
        "chdir" | "cd" => {
            fs.chdir(path_arg(args)?)?;
            Ok(None)
        }
        "ls" => {
            let path = args.first().copied().unwrap_or("");
            let entries = fs.ls(path)?;
            Ok(Some(render_listing(&entries)))
        }
        "open" => {
            let path = path_arg(args)?;
            let mode = args.get(1).copied().ok_or_else(usage)?;
            let fd = fs.open(path, mode)?;
            Ok(Some(format!("fd={fd}")))
        }
        "seek" => {
            let fd = fd_arg(args, 0)?;
            let offset: i64 = args.get(1).and_then(|s| s.parse().ok()).ok_or_else(usage)?;
            let whence = Whence::parse(args.get(2).copied().unwrap_or("SET"))?;
            Ok(Some(fs.seek(fd, offset, whence)?.to_string()))
        }
        "read" => {
            let fd = fd_arg(args, 0)?;
            let length = args.get(1).and_then(|s| s.parse().ok());
            let data = fs.read(fd, length)?;
            Ok(Some(String::from_utf8_lossy(&data).into_owned()))
        }
        "write" => {
            let fd = fd_arg(args, 0)?;
            let data = args.get(1..).unwrap_or(&[]).join(" ");
            fs.write(fd, data.as_bytes())?;
            Ok(None)
        }
        "close" => {
            fs.close(fd_arg(args, 0)?)?;
            Ok(None)
        }
        "cp" => {
            let recursive = args.contains(&"-r");
            let paths: Vec<&str> = args.iter().copied().filter(|a| *a != "-r").collect();
            let (src, dst) = two_paths(&paths)?;
            fs.cp(src, dst, recursive)?;
            Ok(None)
        }
        "mv" => {
            let (src, dst) = two_paths(args)?;
            fs.mv(src, dst)?;
            Ok(None)
        }
        "chmod" => {
            let path = path_arg(args)?;
            let octal = args.get(1).copied().ok_or_else(usage)?;
            fs.chmod(path, octal)?;
            Ok(None)
        }
        "chown" => {
            let path = path_arg(args)?;
            let user = args.get(1).copied().ok_or_else(usage)?;
            fs.chown(path, user)?;
            Ok(None)
        }
        "ln" => {
            let (src, dst) = two_paths(args)?;
            fs.ln(src, dst)?;
            Ok(None)
        }
        "find" => {
            let name = path_arg(args)?;
            Ok(Some(fs.find(name).join("\n")))
        }
        "sudo" => {
            let (inner_cmd, inner_args) = args.split_first().ok_or_else(usage)?;
            let password = prompt::prompt("[sudo] password for admin: ", true)?;
            fs.with_sudo(&password, |fs| dispatch(fs, inner_cmd, inner_args))
        }
        other => Err(Error::InvalidMode(format!("unknown command: {other}"))),
    }
}

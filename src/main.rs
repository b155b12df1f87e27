//! Shell interactif pour émuler un volume FAT32 sur une image disque.
//!
//! Le binaire prend un seul argument : le chemin de l’image. Si le
//! fichier n’existe pas, une image vierge de 20 Mio est créée ; le
//! volume reste “non formaté” tant que `format` n’a pas été lancé.
//!
//! Exemple rapide:
//! ```text
//! fat32_shell disk.img
//! (puis: format, ls, cd, mkdir, touch, help, exit)
//! ```

use std::env;
use std::io::{self, Write};
use std::path::Path;
use std::process::ExitCode;

use fat32_emulator::{DirEntry, FatError, Fat32Fs, FileDisk};

/// Taille d’une image créée de zéro : 20 Mio.
const DEFAULT_IMAGE_BYTES: u64 = 20 * 1024 * 1024;

/// Affiche l’usage du binaire.
fn print_usage() {
    eprintln!(
        "Usage:
  fat32_shell <disk.img>

Si <disk.img> n'existe pas, une image vierge de 20 Mio est créée.
Tapez 'help' dans le shell pour la liste des commandes."
    );
}

/// Affiche l’aide du mode shell interactif.
fn print_shell_help() {
    println!(
        "Commandes:
  format               - (re)formater le volume FAT32
  ls [path]            - lister un répertoire
  cd <path>            - changer de répertoire courant
  mkdir <name>         - créer un sous-répertoire
  touch <name>         - créer un fichier vide
  pwd                  - afficher le répertoire courant
  help                 - cette aide
  exit                 - quitter"
    );
}

/// Point d’entrée : ouvre (ou crée) l’image puis lance le shell.
fn main() -> ExitCode {
    env_logger::init();

    let mut args = env::args().skip(1);
    let img_path = match (args.next(), args.next()) {
        (Some(p), None) => p,
        _ => {
            print_usage();
            return ExitCode::FAILURE;
        }
    };

    let path = Path::new(&img_path);
    let disk = if path.exists() {
        FileDisk::open(path)
    } else {
        println!("Image absente, création de {img_path} ({DEFAULT_IMAGE_BYTES} octets)...");
        FileDisk::create(path, DEFAULT_IMAGE_BYTES)
    };
    let disk = match disk {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Impossible d'ouvrir {img_path}: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut fs = Fat32Fs::new(disk);
    match fs.mount() {
        Ok(()) => {}
        Err(FatError::NotFat32) => {
            println!("Volume non formaté. Lancez `format` pour commencer.")
        }
        Err(e) => {
            eprintln!("Impossible de lire {img_path}: {e}");
            return ExitCode::FAILURE;
        }
    }

    run_shell(&mut fs);
    ExitCode::SUCCESS
}

/// Boucle du shell : prompt, lecture d’une ligne, découpage, dispatch.
///
/// Chaque erreur est locale à sa commande : on l’affiche et la session
/// continue.
fn run_shell(fs: &mut Fat32Fs<FileDisk>) {
    println!("FAT32 shell. Tapez 'help' pour l'aide, 'exit' pour quitter.");

    let stdin = io::stdin();

    loop {
        let cwd = fs.current_path().unwrap_or("(non formaté)");
        print!("fat32:{cwd}> ");
        if io::stdout().flush().is_err() {
            break;
        }

        let mut line = String::new();
        let n = match stdin.read_line(&mut line) {
            Ok(n) => n,
            Err(_) => break,
        };
        if n == 0 {
            break;
        }

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut parts = line.split_whitespace();
        let cmd = parts.next().unwrap();
        let arg = parts.next();

        match cmd {
            "exit" | "quit" => break,
            "help" => print_shell_help(),
            "pwd" => println!("{}", fs.current_path().unwrap_or("(non formaté)")),
            "format" => match fs.format() {
                Ok(()) => println!("Volume formaté."),
                Err(e) => println!("Erreur format: {e}"),
            },
            "ls" => match fs.list(arg) {
                Ok(entries) => print_listing(&entries),
                Err(e) => println!("Erreur ls: {e}"),
            },
            "cd" => match arg {
                Some(p) => {
                    if let Err(e) = fs.change_dir(p) {
                        println!("Erreur cd vers {p}: {e}");
                    }
                }
                None => println!("Usage: cd <path>"),
            },
            "mkdir" => match arg {
                Some(name) => {
                    if let Err(e) = fs.make_dir(name) {
                        println!("Erreur mkdir {name}: {e}");
                    }
                }
                None => println!("Usage: mkdir <name>"),
            },
            "touch" => match arg {
                Some(name) => {
                    if let Err(e) = fs.create_file(name) {
                        println!("Erreur touch {name}: {e}");
                    }
                }
                None => println!("Usage: touch <name>"),
            },
            _ => println!("Commande inconnue: {cmd}. Tapez 'help'."),
        }
    }
}

/// Affiche une vue simple (type + nom + taille) pour chaque entrée.
fn print_listing(entries: &[DirEntry]) {
    for e in entries {
        let kind = if e.is_dir() { "DIR " } else { "FILE" };
        println!("{kind} {:<24} {:>8} bytes", e.name, e.size);
    }
}

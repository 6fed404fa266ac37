//! Generates an argon2 password hash for the `ADMIN_PASSWORD_HASH`
//! configuration value.
//!
//! Usage: `genpass <password>`, or run without arguments to be prompted.

use std::io::{BufRead, Write};

use argon2::Argon2;
use argon2::password_hash::{PasswordHasher, SaltString};
use rand_core::OsRng;

fn main() {
    let password = match std::env::args().nth(1) {
        Some(arg) => arg,
        None => prompt_password(),
    };

    if password.is_empty() {
        eprintln!("Error: password cannot be empty");
        std::process::exit(1);
    }

    let salt = SaltString::generate(&mut OsRng);
    let hash = match Argon2::default().hash_password(password.as_bytes(), &salt) {
        Ok(hash) => hash.to_string(),
        Err(err) => {
            eprintln!("Error: failed to hash password: {err}");
            std::process::exit(1);
        }
    };

    println!("Password hash generated:");
    println!("{hash}");
    println!();
    println!("Add this line to your .env:");
    println!("ADMIN_PASSWORD_HASH={hash}");
}

fn prompt_password() -> String {
    print!("Enter password: ");
    let _ = std::io::stdout().flush();

    let mut line = String::new();
    if std::io::stdin().lock().read_line(&mut line).is_err() {
        return String::new();
    }
    line.trim_end_matches(['\r', '\n']).to_string()
}

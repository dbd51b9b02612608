use std::{error::Error, io, process::exit, str::FromStr};

use clap::Parser;
use email_address::EmailAddress;
use rusqlite::Connection;

use rateshop_rs::{
    PasswordHash, Role, ValidatedPassword, initialize_db,
    user::{NewUser, create_user},
};

/// A utility for seeding an ADMIN account into the application database.
///
/// Admin accounts cannot be created through public sign-up, so a fresh
/// deployment uses this tool to create the first one.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database. Created if it does not
    /// exist yet.
    #[arg(long)]
    db_path: String,

    /// The admin's display name.
    #[arg(long)]
    name: String,

    /// The admin's email address.
    #[arg(long)]
    email: String,

    /// The admin's postal address.
    #[arg(long, default_value = "")]
    address: String,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let email = match EmailAddress::from_str(&args.email) {
        Ok(email) => email,
        Err(error) => {
            print_error(format!("'{}' is not a valid email: {error}", args.email));
            exit(1);
        }
    };

    let password_hash = match get_password_hash() {
        Some(password_hash) => password_hash,
        None => return Ok(()),
    };

    let conn = Connection::open(&args.db_path)?;
    initialize_db(&conn)?;

    let admin = create_user(
        NewUser {
            name: args.name,
            email,
            password_hash,
            address: args.address,
            role: Role::Admin,
        },
        &conn,
    )?;

    println!("Created admin {} <{}>", admin.name, admin.email);

    Ok(())
}

fn get_password_hash() -> Option<PasswordHash> {
    loop {
        println!();

        let first_password = match rpassword::prompt_password("Enter a password: ") {
            Ok(string) => string,
            Err(error) if error.kind() == io::ErrorKind::UnexpectedEof => {
                return None;
            }
            Err(error) => {
                print_error(format!("Could not read password from stdin: {error}"));
                return None;
            }
        };

        if let Err(error) = ValidatedPassword::new(&first_password) {
            print_error(error);
            continue;
        }

        let second_password = match rpassword::prompt_password("Enter the same password again: ") {
            Ok(string) => string,
            Err(error) if error.kind() == io::ErrorKind::UnexpectedEof => {
                return None;
            }
            Err(error) => {
                print_error(format!("Could not read password from stdin: {error}"));
                return None;
            }
        };

        if first_password != second_password {
            print_error("Passwords must match, try again.");
            continue;
        }

        let password_hash =
            match PasswordHash::from_raw_password(&first_password, PasswordHash::DEFAULT_COST) {
                Ok(password_hash) => password_hash,
                Err(error) => {
                    print_error(format!("Could not hash password: {error}. Try again."));
                    continue;
                }
            };

        return Some(password_hash);
    }
}

fn print_error(error: impl ToString) {
    eprintln!("\x1b[31;1m{}\x1b[0m", error.to_string())
}

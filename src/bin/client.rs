//! Interactive command-line client for a cellstore server
//!
//! Every line is sent as one command, split on whitespace, and the reply is
//! printed the way redis-cli prints it.

use cellstore::Client;
use clap::Parser;
use std::io::{self, Write};

#[derive(Parser, Debug)]
#[command(name = "cellstore-cli", version, about = "cellstore command-line client")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:6379")]
    addr: String,

    /// Run a single command and exit instead of starting a prompt
    #[arg(trailing_var_arg = true)]
    command: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let mut client = Client::connect(args.addr.as_str()).await?;

    if !args.command.is_empty() {
        println!("{}", client.call(&args.command).await?);
        client.close().await?;
        return Ok(());
    }

    println!("Connected to {}. Type 'help' for help or 'quit' to exit.", args.addr);

    loop {
        print!("{}> ", args.addr);
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let words: Vec<&str> = input.split_whitespace().collect();

        match words.as_slice() {
            [] => continue,
            [word] if word.eq_ignore_ascii_case("quit") || word.eq_ignore_ascii_case("exit") => {
                break;
            }
            [word] if word.eq_ignore_ascii_case("help") => print_help(),
            _ => match client.call(&words).await {
                Ok(response) => println!("{}", response),
                Err(e) => {
                    println!("Error: {}", e);
                    break;
                }
            },
        }
    }

    client.close().await?;
    Ok(())
}

fn print_help() {
    println!("Type any command followed by its arguments, for example:");
    println!("  SET greeting hello");
    println!("  RPUSH queue a b c");
    println!("  LRANGE queue 0 -1");
    println!("  HSET user:1 name ada");
    println!("  EXPIRE greeting 60");
    println!("  help               - Show this help message");
    println!("  quit               - Exit the client");
}

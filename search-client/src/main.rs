//! Small interactive REPL client for manually exercising `search-server`.
//!
//! Grounded in the original project's `Client`: connect, print the
//! welcome line (or wait out `SERVER_BUSY` until promoted), then loop
//! reading a query from stdin, sending `search <query>`, and printing
//! the formatted result list. Selecting a result index sends
//! `getsnippet <n>` and prints the returned snippets. This binary has no
//! bearing on the server's correctness; it is a convenience tool, not
//! part of the protocol surface.

use std::io::{self, BufRead, BufReader, Write};
use std::net::TcpStream;

use anyhow::{bail, Context, Result};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "search-client", about = "Interactive client for search-server.")]
struct Settings {
    /// Host the search server is listening on.
    #[structopt(long, default_value = "127.0.0.1")]
    host: String,

    /// Port the search server is listening on.
    #[structopt(long, default_value = "8080")]
    port: u16,
}

fn main() {
    let settings = Settings::from_args();
    if let Err(e) = run(settings) {
        eprintln!("error: {:?}", e);
        std::process::exit(1);
    }
}

fn run(settings: Settings) -> Result<()> {
    let stream = TcpStream::connect((settings.host.as_str(), settings.port))
        .with_context(|| format!("failed to connect to {}:{}", settings.host, settings.port))?;
    let mut writer = stream.try_clone().context("failed to clone socket")?;
    let mut reader = BufReader::new(stream);

    let first = read_line(&mut reader)?;
    match first {
        Some(line) if line == "SERVER_BUSY" => {
            println!("You have been added to the queue. Please wait...");
            loop {
                match read_line(&mut reader)? {
                    Some(line) if line == "Welcome to Search Server!" => {
                        println!("\nA slot has become available. You are now connected.");
                        break;
                    }
                    Some(_) => continue,
                    None => {
                        println!("\nServer disconnected while waiting in queue.");
                        return Ok(());
                    }
                }
            }
        }
        Some(_) => println!("Connected to Search Server successfully."),
        None => {
            println!("Server disconnected immediately.");
            return Ok(());
        }
    }

    let stdin = io::stdin();
    loop {
        print!("\nEnter query (or 'quit' to exit): ");
        io::stdout().flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "quit" {
            send_line(&mut writer, "quit")?;
            break;
        }

        send_line(&mut writer, &format!("search {}", line))?;
        let header = match read_line(&mut reader)? {
            Some(h) => h,
            None => bail!("connection closed by server"),
        };

        if !show_results(&header, &mut reader)? {
            continue;
        }

        loop {
            print!("\nEnter a file index to view snippets, or 'q' to go back: ");
            io::stdout().flush().ok();

            let mut snippet_command = String::new();
            if stdin.lock().read_line(&mut snippet_command)? == 0 {
                break;
            }
            let snippet_command = snippet_command.trim();

            if snippet_command == "q" || snippet_command == "quit" {
                break;
            }
            if !snippet_command.bytes().all(|b| b.is_ascii_digit()) || snippet_command.is_empty() {
                println!("Invalid command. Please enter a number or 'q'.");
                continue;
            }

            send_line(&mut writer, &format!("getsnippet {}", snippet_command))?;
            let snippet_header = match read_line(&mut reader)? {
                Some(h) => h,
                None => bail!("connection closed by server"),
            };
            let snippet_data = if snippet_header.starts_with("SNIPPETS_FOUND:") {
                read_line(&mut reader)?.unwrap_or_default()
            } else {
                String::new()
            };
            show_snippets(&snippet_header, &snippet_data);
        }
    }

    println!("Disconnecting...");
    Ok(())
}

fn show_results(header: &str, reader: &mut BufReader<TcpStream>) -> Result<bool> {
    if header == "NOT_FOUND" {
        println!("No results found.");
        return Ok(false);
    }

    if let Some(rest) = header.strip_prefix("OK:") {
        let count: usize = rest.trim().parse().unwrap_or(0);
        println!("Found {} results:", count);
        for i in 0..count {
            match read_line(reader)? {
                Some(line) => println!("  {}", line),
                None => {
                    println!("Error receiving result line {}", i);
                    break;
                }
            }
        }
        return Ok(true);
    }

    println!("Unknown server response: {}", header);
    Ok(false)
}

fn show_snippets(header: &str, data: &str) {
    if header.starts_with("SNIPPETS_FOUND:") {
        println!("\n--- Snippets ---");
        for snippet in data.split(';') {
            if !snippet.is_empty() {
                println!("{}", snippet);
                println!("----------------");
            }
        }
    } else {
        println!("Server response: {}", header);
    }
}

/// Reads one `\n`-terminated line, stripping a trailing `\r`. Returns
/// `None` on EOF.
fn read_line(reader: &mut BufReader<TcpStream>) -> Result<Option<String>> {
    let mut line = String::new();
    let n = reader.read_line(&mut line).context("failed to read from server")?;
    if n == 0 {
        return Ok(None);
    }
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(Some(line))
}

fn send_line(stream: &mut TcpStream, line: &str) -> Result<()> {
    stream
        .write_all(format!("{}\n", line).as_bytes())
        .context("failed to write to server")
}

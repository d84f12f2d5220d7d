//! Interactive line-oriented client for donation-server.
//!
//! ```text
//! cargo run -p donation-server --example donor_client
//! >> donate 2 100
//! << DONATE charity=2 amount=100
//! ```
//!
//! `DONATION_CLIENT_ADDR` overrides the server address and
//! `DONATION_LAYOUT` (compact|legacy) the frame layout.

use std::env;
use std::io::{self, Write};

use anyhow::{anyhow, bail, Context, Result};
use donation_protocol::{FrameLayout, Request, Response};
use donation_server::framing::{write_request, FrameReader};
use tokio::net::TcpStream;

fn next_arg<'a>(words: &mut impl Iterator<Item = &'a str>, name: &str) -> Result<&'a str> {
    words.next().ok_or_else(|| anyhow!("missing {name}"))
}

fn parse_command(line: &str) -> Result<Request> {
    let mut words = line.split_whitespace();
    let cmd = words.next().unwrap_or_default().to_ascii_lowercase();

    let req = match cmd.as_str() {
        "donate" => Request::Donate {
            charity: next_arg(&mut words, "charity id")?.parse().context("charity id")?,
            amount: next_arg(&mut words, "amount")?.parse().context("amount")?,
        },
        "cinfo" => Request::Cinfo {
            charity: next_arg(&mut words, "charity id")?.parse().context("charity id")?,
        },
        "top" => Request::Top,
        "stats" => Request::Stats,
        "logout" => Request::Logout,
        other => bail!("unknown command: {other}"),
    };
    Ok(req)
}

fn describe(resp: &Response) -> String {
    match resp {
        Response::Donate { charity, amount } => format!("DONATE charity={charity} amount={amount}"),
        Response::Cinfo(rec) => format!(
            "CINFO total={} top={} count={}",
            rec.total_donation_amt, rec.top_donation, rec.num_donations
        ),
        Response::Top(totals) => format!("TOP {:?}", totals),
        Response::Stats(s) => format!(
            "STATS max={}:{} min={}:{}",
            s.max_charity, s.max_amount, s.min_charity, s.min_amount
        ),
        Response::Logout => "LOGOUT".to_string(),
        Response::Error => "ERROR".to_string(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let addr = env::var("DONATION_CLIENT_ADDR").unwrap_or_else(|_| "127.0.0.1:9000".to_string());
    let layout: FrameLayout = env::var("DONATION_LAYOUT")
        .unwrap_or_else(|_| "compact".to_string())
        .parse()
        .map_err(|e: String| anyhow!(e))?;

    println!("Connecting to {} ({} frames)...", addr, layout);
    let stream = TcpStream::connect(&addr)
        .await
        .with_context(|| format!("connect to {addr}"))?;
    let (read_half, mut write_half) = stream.into_split();
    let mut frames = FrameReader::new(read_half, layout);
    println!("Connected. Commands: donate <id> <amt>, cinfo <id>, top, stats, logout");

    let stdin = io::stdin();
    loop {
        print!(">> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            println!("\nEOF on stdin, exiting client.");
            break;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let req = match parse_command(trimmed) {
            Ok(req) => req,
            Err(e) => {
                eprintln!("{e:#}");
                continue;
            }
        };

        write_request(&mut write_half, &req, layout).await?;
        match frames.next_response().await? {
            Some(resp) => println!("<< {}", describe(&resp)),
            None => {
                println!("Server closed the connection.");
                break;
            }
        }

        if req == Request::Logout {
            break;
        }
    }

    Ok(())
}

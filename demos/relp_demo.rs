// ABOUTME: Example application demonstrating sending syslog lines over RELP with reconnect-on-failure
// ABOUTME: Shows SessionBuilder::connect plus the caller-driven retry loop the core leaves out

use argh::FromArgs;
use relp::{RelpBatch, RelpSession, PlainDialer, SessionBuilder};
use std::error::Error;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Example application sending a single syslog line over RELP, retrying the
/// connection until the collector accepts it.
#[derive(FromArgs)]
struct CliArgs {
    /// whether to enable trace-level logging
    #[argh(switch, short = 'd')]
    debugging: bool,

    /// the hostname or IP address of the RELP collector (default: localhost)
    #[argh(option)]
    host: Option<String>,

    /// the port to use when connecting to the collector (default: 2514)
    #[argh(option, short = 'p')]
    port: Option<u16>,

    /// the syslog message to send
    #[argh(option, short = 'm')]
    message: String,

    /// seconds to wait between reconnect attempts (default: 5)
    #[argh(option)]
    retry_delay: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli_args: CliArgs = argh::from_env();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(if cli_args.debugging { Level::TRACE } else { Level::INFO })
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let host = cli_args.host.unwrap_or_else(|| "localhost".to_owned());
    let port = cli_args.port.unwrap_or(2514);
    let retry_delay = Duration::from_secs(cli_args.retry_delay.unwrap_or(5));

    let mut batch = RelpBatch::new();
    batch.insert(cli_args.message.into_bytes());

    let mut session = connect_with_retry(&host, port, retry_delay).await;

    loop {
        if let Err(err) = session.commit(&mut batch).await {
            eprintln!("error committing batch: {err}");
        }

        if batch.verify_all() {
            break;
        }

        batch.retry_all_failed();
        reconnect_with_retry(&mut session, retry_delay).await;
    }

    session.disconnect().await?;
    println!(">> done <<");
    Ok(())
}

/// Connects, retrying indefinitely with a fixed delay on failure. Mirrors
/// the reference demo's retry loop: TearDown, Connect, sleep, repeat.
async fn connect_with_retry(
    host: &str,
    port: u16,
    retry_delay: Duration,
) -> RelpSession<PlainDialer> {
    loop {
        match SessionBuilder::connect(host, port).await {
            Ok(session) => return session,
            Err(err) => {
                eprintln!("{err}");
                tokio::time::sleep(retry_delay).await;
            }
        }
    }
}

/// Reconnects to the host and port used by `session`'s last successful
/// connect, retrying indefinitely with a fixed delay on failure.
async fn reconnect_with_retry(session: &mut RelpSession<PlainDialer>, retry_delay: Duration) {
    loop {
        match session.reconnect().await {
            Ok(()) => return,
            Err(err) => {
                eprintln!("{err}");
                tokio::time::sleep(retry_delay).await;
            }
        }
    }
}

//! Fetch a URL twice over one pooled connection.
//!
//! ```sh
//! cargo run -p xrequests --example session_usage -- https://example.com/ [proxy-url]
//! ```

use std::time::Duration;
use tracing_subscriber::EnvFilter;
use xrequests::{RequestError, Session};

fn main() -> Result<(), RequestError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("xrequests=debug")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let url = args.next().unwrap_or_else(|| "https://example.com/".to_owned());

    let mut builder = Session::builder()
        .timeout(Duration::from_secs(10))
        .user_agent("xrequests-example/0.1");
    if let Some(proxy) = args.next() {
        builder = builder.proxy(proxy);
    }
    let session = builder.build()?;

    for attempt in 1..=2 {
        let resp = session.get(&url).header("Accept", "*/*").send()?;
        println!(
            "#{attempt} {resp} {} bytes, content-type {}",
            resp.body().len(),
            resp.content_type().unwrap_or("-")
        );
    }

    for key in session.pool_keys() {
        if let Some(id) = session.connection_id(&key) {
            println!("pooled: {key} (connection {id})");
        }
    }
    Ok(())
}

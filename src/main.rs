#![deny(clippy::all, clippy::nursery)]
#![deny(nonstandard_style, rust_2018_idioms)]

use std::env;
use std::process::ExitCode;

use aws_sdk_sns::Region;

mod handler;
mod instance;

use handler::Handler;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt().init();

    let Some(input) = read_input(env::var("LAMBDA_INPUT").ok()) else {
        println!("Not being called from an AWS Lambda function.");
        return ExitCode::from(1);
    };

    let config = aws_config::from_env()
        .region(Region::new("us-east-2"))
        .load()
        .await;

    match Handler::new(&config).handle(&input).await {
        Ok(outcome) => println!("{outcome}"),
        // A fault must not keep a dedicated instance alive; report it
        // and fall through to cleanup.
        Err(err) => println!("{:?}", anyhow::Error::new(err)),
    }

    if dedicated_instance(env::var("DEDICATED_ECS_INSTANCE").ok().as_deref()) {
        println!("Terminating EC2 instance...");
        if let Err(err) = instance::terminate_current(&config).await {
            println!("{err:?}");
        }
    }

    // Faults and declined publishes are reported on stdout; the exit
    // status only distinguishes "never invoked" from "invoked".
    ExitCode::SUCCESS
}

fn read_input(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Only a case-insensitive "true" opts in; anything else, including
/// unset and malformed values, leaves the instance running.
fn dedicated_instance(flag: Option<&str>) -> bool {
    flag.is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

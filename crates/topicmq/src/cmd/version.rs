use topicmq_frame::PROTOCOL_VERSION;
use topicmq_transport::has_curve;

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("topicmq {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    let (major, minor, patch) = zmq::version();
    println!("name: topicmq");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!("protocol_version: {PROTOCOL_VERSION}");
    println!("libzmq: {major}.{minor}.{patch}");
    println!("curve: {}", has_curve());
    println!(
        "target: {}",
        option_env!("TOPICMQ_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));

    Ok(SUCCESS)
}

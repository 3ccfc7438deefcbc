use topicmq_transport::has_curve;

use crate::cmd::KeygenArgs;
use crate::exit::{CliError, CliResult, INTERNAL, SUCCESS, UNAVAILABLE};
use crate::output::{print_keypair, OutputFormat};

pub fn run(_args: KeygenArgs, format: OutputFormat) -> CliResult<i32> {
    if !has_curve() {
        return Err(CliError::new(
            UNAVAILABLE,
            "linked libzmq was built without CURVE support",
        ));
    }
    let pair = zmq::CurveKeyPair::new()
        .map_err(|err| CliError::new(INTERNAL, format!("key generation failed: {err}")))?;
    let public_key = z85(&pair.public_key)?;
    let secret_key = z85(&pair.secret_key)?;
    print_keypair(&public_key, &secret_key, format);
    Ok(SUCCESS)
}

fn z85(key: &[u8]) -> CliResult<String> {
    zmq::z85_encode(key).map_err(|err| CliError::new(INTERNAL, format!("z85 encoding failed: {err}")))
}

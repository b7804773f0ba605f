use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("isbridge {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: isbridge");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "build_target: {}",
        option_env!("ISBRIDGE_BUILD_TARGET").unwrap_or("unknown")
    );
    println!(
        "rustc: {}",
        option_env!("RUSTC_VERSION").unwrap_or("unknown")
    );
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!(
        "features: client={}, bridge={}, async={}, cli=true",
        cfg!(feature = "client"),
        cfg!(feature = "bridge"),
        cfg!(feature = "async")
    );
    println!(
        "frame: max_payload={}, packet_buffer={}",
        isbridge_frame::MAX_PAYLOAD,
        isbridge_frame::PKT_BUF_SIZE
    );

    Ok(SUCCESS)
}

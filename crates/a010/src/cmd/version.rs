use a010_frame::{PIXELS_LEN_MAX, PIXELS_LEN_MIN};
use a010_transport::BaudRate;

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("a010 {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: a010");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!("build_target: {}", env!("A010_BUILD_TARGET"));
    println!(
        "build_profile: {}",
        option_env!("A010_BUILD_PROFILE").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!(
        "features: device={}, async={}, cli=true",
        cfg!(feature = "device"),
        cfg!(feature = "async")
    );
    println!("pixels_per_frame: {PIXELS_LEN_MIN}..={PIXELS_LEN_MAX}");
    let rates: Vec<String> = BaudRate::ALL.iter().map(|r| r.bps().to_string()).collect();
    println!("baud_rates: {}", rates.join(","));
    println!("default_baud: {}", BaudRate::default().bps());

    Ok(SUCCESS)
}

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("agilent-vacuum {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: agilent-vacuum");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("AGILENT_VACUUM_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "features: serial={}, mock={}, cli=true",
        cfg!(feature = "serial"),
        cfg!(feature = "mock")
    );
    println!("devices: twistorr74, ipcmini");

    Ok(SUCCESS)
}

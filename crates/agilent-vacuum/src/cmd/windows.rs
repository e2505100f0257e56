use crate::cmd::WindowsArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_catalog, OutputFormat};

pub fn run(args: WindowsArgs, format: OutputFormat) -> CliResult<i32> {
    print_catalog(&args.device.catalog(), format);
    Ok(SUCCESS)
}

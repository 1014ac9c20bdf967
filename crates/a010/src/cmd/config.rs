use a010_device::{AtCommand, Camera, CameraConfig, DisplayFlags, DisplayTarget};
use a010_transport::{BaudRate, LinkConfig};
use serde::Serialize;

use crate::cmd::{binning_for, ConfigArgs, Toggle};
use crate::exit::{device_error, transport_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_summary, OutputFormat};

#[derive(Serialize)]
struct ConfigOutput {
    kind: &'static str,
    device: String,
    commands: Vec<String>,
}

pub fn run(args: ConfigArgs, format: OutputFormat) -> CliResult<i32> {
    let commands = plan(&args)?;
    if commands.is_empty() {
        return Err(CliError::new(USAGE, "no settings given"));
    }

    let baud_rate =
        BaudRate::from_bps(args.baud).map_err(|err| transport_error("invalid --baud", err))?;
    let config = CameraConfig {
        link: LinkConfig {
            baud_rate,
            ..LinkConfig::default()
        },
        ..CameraConfig::default()
    };
    let camera = Camera::open(&args.device, config).map_err(|err| device_error("open failed", err))?;

    for command in &commands {
        let sent = match *command {
            AtCommand::Baud(rate) => camera.set_baud_rate(rate),
            AtCommand::Display(flags) => camera.set_display_flags(flags),
            other => camera.send(&other),
        };
        sent.map_err(|err| device_error("configure failed", err))?;
    }
    camera
        .terminate()
        .map_err(|err| device_error("configure failed", err))?;

    let record = ConfigOutput {
        kind: "config",
        device: args.device.display().to_string(),
        commands: commands.iter().map(ToString::to_string).collect(),
    };
    print_summary(
        &record,
        &[
            ("device", record.device.clone()),
            ("commands", record.commands.join(" ")),
        ],
        format,
    );
    Ok(SUCCESS)
}

/// Commands for the requested settings, in send order. A speed change goes
/// after everything else except `SAVE`, so the settings before it travel at
/// the speed the camera is currently listening on.
fn plan(args: &ConfigArgs) -> CliResult<Vec<AtCommand>> {
    let mut commands = Vec::new();

    if let Some(isp) = args.isp {
        commands.push(AtCommand::Isp(isp.is_on()));
    }
    if let Some(side) = args.binning {
        commands.push(AtCommand::Binning(binning_for(side)?));
    }
    if let Some(flags) = display_flags(args) {
        commands.push(AtCommand::Display(flags));
    }
    if let Some(unit) = args.unit {
        commands.push(AtCommand::unit(unit));
    }
    if let Some(fps) = args.fps {
        commands.push(AtCommand::fps(fps));
    }
    if let Some(ae) = args.ae {
        commands.push(AtCommand::AutoExposure(ae.is_on()));
    }
    if let Some(antimmi) = args.antimmi {
        commands.push(AtCommand::AntiInterference(antimmi.is_on()));
    }
    if let Some(bps) = args.set_baud {
        let rate =
            BaudRate::from_bps(bps).map_err(|err| transport_error("invalid --set-baud", err))?;
        commands.push(AtCommand::Baud(rate));
    }
    if args.save {
        commands.push(AtCommand::Save);
    }
    Ok(commands)
}

fn display_flags(args: &ConfigArgs) -> Option<DisplayFlags> {
    let toggles = [
        (DisplayTarget::Lcd, args.lcd),
        (DisplayTarget::Usb, args.usb),
        (DisplayTarget::Uart, args.uart),
    ];
    if toggles.iter().all(|(_, toggle)| toggle.is_none()) {
        return None;
    }
    let mut flags = DisplayFlags::default();
    for (target, toggle) in toggles {
        if let Some(toggle) = toggle {
            flags.set(target, toggle.is_on());
        }
    }
    Some(flags)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use a010_device::Binning;

    use super::*;

    fn args() -> ConfigArgs {
        ConfigArgs {
            device: PathBuf::from("/dev/ttyUSB0"),
            baud: 115_200,
            isp: None,
            binning: None,
            fps: None,
            unit: None,
            lcd: None,
            usb: None,
            uart: None,
            ae: None,
            antimmi: None,
            set_baud: None,
            save: false,
        }
    }

    #[test]
    fn empty_request_plans_nothing() {
        assert!(plan(&args()).unwrap().is_empty());
    }

    #[test]
    fn commands_follow_send_order() {
        let args = ConfigArgs {
            isp: Some(Toggle::On),
            binning: Some(50),
            usb: Some(Toggle::On),
            fps: Some(40),
            set_baud: Some(921_600),
            save: true,
            ..args()
        };
        let commands = plan(&args).unwrap();
        assert_eq!(
            commands,
            vec![
                AtCommand::Isp(true),
                AtCommand::Binning(Binning::Half),
                AtCommand::Display(DisplayFlags::from_bits_truncate(0b011)),
                AtCommand::Fps(20),
                AtCommand::Baud(BaudRate::B921600),
                AtCommand::Save,
            ]
        );
    }

    #[test]
    fn display_toggles_start_from_power_on_mask() {
        let args = ConfigArgs {
            lcd: Some(Toggle::Off),
            uart: Some(Toggle::On),
            ..args()
        };
        assert_eq!(display_flags(&args).map(DisplayFlags::bits), Some(0b100));
    }

    #[test]
    fn unsupported_target_speed_is_a_usage_error() {
        let args = ConfigArgs {
            set_baud: Some(12_345),
            ..args()
        };
        assert_eq!(plan(&args).unwrap_err().code, USAGE);
    }
}

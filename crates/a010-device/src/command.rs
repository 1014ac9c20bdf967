//! ASCII `AT+` command channel.
//!
//! Commands travel over the same link as the frame stream, each terminated by
//! a carriage return. The camera does not acknowledge them on the frame
//! channel, so sending is fire-and-forget.

use std::fmt;

use a010_transport::BaudRate;
use tracing::warn;

/// Terminator appended to every command.
pub const COMMAND_TERMINATOR: u8 = b'\r';

/// Highest quantization unit the camera accepts.
pub const UNIT_MAX: u8 = 9;

/// Accepted frame-rate range.
pub const FPS_MIN: u8 = 1;
pub const FPS_MAX: u8 = 20;

/// Sensor binning mode, which fixes the image geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binning {
    /// 100x100 pixels.
    Full,
    /// 50x50 pixels.
    Half,
    /// 25x25 pixels.
    Quarter,
}

impl Binning {
    /// Image side length in pixels.
    pub const fn side(self) -> u8 {
        match self {
            Binning::Full => 100,
            Binning::Half => 50,
            Binning::Quarter => 25,
        }
    }

    /// Pixel payload size of a frame in this mode.
    pub const fn pixels_len(self) -> usize {
        let side = self.side() as usize;
        side * side
    }

    /// Argument of `AT+BINN`.
    pub const fn factor(self) -> u8 {
        match self {
            Binning::Full => 1,
            Binning::Half => 2,
            Binning::Quarter => 4,
        }
    }

    pub fn from_side(side: u8) -> Option<Self> {
        match side {
            100 => Some(Binning::Full),
            50 => Some(Binning::Half),
            25 => Some(Binning::Quarter),
            _ => None,
        }
    }
}

/// Output the camera mirrors its image to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayTarget {
    Lcd,
    Usb,
    Uart,
}

impl DisplayTarget {
    const fn bit(self) -> u8 {
        match self {
            DisplayTarget::Lcd => 0b001,
            DisplayTarget::Usb => 0b010,
            DisplayTarget::Uart => 0b100,
        }
    }
}

impl fmt::Display for DisplayTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DisplayTarget::Lcd => "lcd",
            DisplayTarget::Usb => "usb",
            DisplayTarget::Uart => "uart",
        })
    }
}

/// Bitmask argument of `AT+DISP`: bit 0 LCD, bit 1 USB, bit 2 UART.
///
/// The camera only accepts the whole mask, so toggling one output means
/// remembering the others. Defaults to LCD only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayFlags(u8);

impl DisplayFlags {
    pub const NONE: Self = Self(0);
    pub const ALL: Self = Self(0b111);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn from_bits_truncate(bits: u8) -> Self {
        Self(bits & Self::ALL.0)
    }

    pub const fn contains(self, target: DisplayTarget) -> bool {
        self.0 & target.bit() != 0
    }

    /// Copy with `target` switched on or off.
    #[must_use]
    pub const fn with(self, target: DisplayTarget, on: bool) -> Self {
        if on {
            Self(self.0 | target.bit())
        } else {
            Self(self.0 & !target.bit())
        }
    }

    pub fn set(&mut self, target: DisplayTarget, on: bool) {
        *self = self.with(target, on);
    }
}

impl Default for DisplayFlags {
    fn default() -> Self {
        Self(DisplayTarget::Lcd.bit())
    }
}

/// A camera configuration command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtCommand {
    /// Start or stop the image signal processor. Frames resume 1-2 s after starting.
    Isp(bool),
    Binning(Binning),
    Display(DisplayFlags),
    /// Camera-side UART speed. The host side must follow.
    Baud(BaudRate),
    /// Quantization unit: 0 maps depth as `5.1 * sqrt(depth)`, otherwise `depth / unit`.
    Unit(u8),
    Fps(u8),
    /// Anti multi-machine interference.
    AntiInterference(bool),
    AutoExposure(bool),
    /// Persist the current configuration on the camera.
    Save,
}

impl AtCommand {
    /// Quantization unit command. Values above 9 are replaced by 0.
    pub fn unit(unit: u8) -> Self {
        if unit > UNIT_MAX {
            warn!(unit, "quantization unit must be in 0..=9; using 0");
            return AtCommand::Unit(0);
        }
        AtCommand::Unit(unit)
    }

    /// Frame-rate command. Values are clamped into 1..=20.
    pub fn fps(fps: u8) -> Self {
        let clamped = fps.clamp(FPS_MIN, FPS_MAX);
        if clamped != fps {
            warn!(fps, clamped, "fps must be in 1..=20; clamping");
        }
        AtCommand::Fps(clamped)
    }

    /// Command name as it appears after `AT+`.
    pub const fn name(&self) -> &'static str {
        match self {
            AtCommand::Isp(_) => "ISP",
            AtCommand::Binning(_) => "BINN",
            AtCommand::Display(_) => "DISP",
            AtCommand::Baud(_) => "BAUD",
            AtCommand::Unit(_) => "UNIT",
            AtCommand::Fps(_) => "FPS",
            AtCommand::AntiInterference(_) => "ANTIMMI",
            AtCommand::AutoExposure(_) => "AE",
            AtCommand::Save => "SAVE",
        }
    }

    /// Numeric argument, if the command takes one.
    ///
    /// Variants built directly with out-of-range values are normalized here
    /// the same way [`unit`](Self::unit) and [`fps`](Self::fps) do, silently.
    pub fn argument(&self) -> Option<u32> {
        let arg = match *self {
            AtCommand::Isp(on) | AtCommand::AntiInterference(on) | AtCommand::AutoExposure(on) => {
                u32::from(on)
            }
            AtCommand::Binning(binning) => u32::from(binning.factor()),
            AtCommand::Display(flags) => u32::from(flags.bits()),
            AtCommand::Baud(rate) => u32::from(rate.command_index()),
            AtCommand::Unit(unit) if unit > UNIT_MAX => 0,
            AtCommand::Unit(unit) => u32::from(unit),
            AtCommand::Fps(fps) => u32::from(fps.clamp(FPS_MIN, FPS_MAX)),
            AtCommand::Save => return None,
        };
        Some(arg)
    }

    /// Wire bytes, including the trailing carriage return.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.to_string().into_bytes();
        bytes.push(COMMAND_TERMINATOR);
        bytes
    }
}

impl fmt::Display for AtCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.argument() {
            Some(arg) => write!(f, "AT+{}={arg}", self.name()),
            None => write!(f, "AT+{}", self.name()),
        }
    }
}

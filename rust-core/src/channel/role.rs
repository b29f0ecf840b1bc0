//! Channel roles and output categories

use std::fmt;
use std::str::FromStr;

use crate::error::EngineError;

/// Role of a channel within its instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelRole {
    /// Time-domain samples
    InputReal,
    /// Window type selector
    SetWindowType,
    /// Sampling frequency
    SetSampleFreq,
    /// Duration of the last cycle (read-only)
    ExecutionTime,
    OutputReal,
    OutputImag,
    OutputMagn,
    OutputPhas,
    OutputFscale,
    OutputWindow,
}

impl ChannelRole {
    pub const ALL: [ChannelRole; 10] = [
        ChannelRole::InputReal,
        ChannelRole::SetWindowType,
        ChannelRole::SetSampleFreq,
        ChannelRole::ExecutionTime,
        ChannelRole::OutputReal,
        ChannelRole::OutputImag,
        ChannelRole::OutputMagn,
        ChannelRole::OutputPhas,
        ChannelRole::OutputFscale,
        ChannelRole::OutputWindow,
    ];

    /// Token used in link strings
    pub fn token(self) -> &'static str {
        match self {
            ChannelRole::InputReal => "input-real",
            ChannelRole::SetWindowType => "windowtype",
            ChannelRole::SetSampleFreq => "sample-freq",
            ChannelRole::ExecutionTime => "exectime",
            ChannelRole::OutputReal => "output-real",
            ChannelRole::OutputImag => "output-imag",
            ChannelRole::OutputMagn => "output-magn",
            ChannelRole::OutputPhas => "output-phas",
            ChannelRole::OutputFscale => "output-fscale",
            ChannelRole::OutputWindow => "output-window",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ChannelRole::InputReal => "InputReal",
            ChannelRole::SetWindowType => "SetWindowType",
            ChannelRole::SetSampleFreq => "SetSampleFreq",
            ChannelRole::ExecutionTime => "ExecutionTime",
            ChannelRole::OutputReal => "OutputReal",
            ChannelRole::OutputImag => "OutputImag",
            ChannelRole::OutputMagn => "OutputMagn",
            ChannelRole::OutputPhas => "OutputPhas",
            ChannelRole::OutputFscale => "OutputFscale",
            ChannelRole::OutputWindow => "OutputWindow",
        }
    }

    /// Input roles are collected into the engine at the start of a cycle
    pub fn is_input(self) -> bool {
        matches!(
            self,
            ChannelRole::InputReal | ChannelRole::SetWindowType | ChannelRole::SetSampleFreq
        )
    }

    /// Output category fed to this role, if it carries an array
    pub fn category(self) -> Option<Category> {
        match self {
            ChannelRole::OutputReal => Some(Category::Real),
            ChannelRole::OutputImag => Some(Category::Imag),
            ChannelRole::OutputMagn => Some(Category::Magnitude),
            ChannelRole::OutputPhas => Some(Category::Phase),
            ChannelRole::OutputFscale => Some(Category::Scale),
            ChannelRole::OutputWindow => Some(Category::Window),
            _ => None,
        }
    }

    /// Notification a reader of this role should wait on
    pub fn scan_kind(self) -> Option<ScanKind> {
        self.category().map(Category::scan_kind)
    }
}

impl FromStr for ChannelRole {
    type Err = EngineError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|role| role.token() == token)
            .ok_or_else(|| EngineError::UnknownRole(token.to_string()))
    }
}

impl fmt::Display for ChannelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Derived output representation of one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Real,
    Imag,
    /// 20*log10(|X|)
    Magnitude,
    /// atan(im/re)
    Phase,
    /// Frequency of each bin
    Scale,
    /// Window coefficients
    Window,
}

impl Category {
    pub const COUNT: usize = 6;

    pub const ALL: [Category; Category::COUNT] = [
        Category::Real,
        Category::Imag,
        Category::Magnitude,
        Category::Phase,
        Category::Scale,
        Category::Window,
    ];

    pub fn index(self) -> usize {
        match self {
            Category::Real => 0,
            Category::Imag => 1,
            Category::Magnitude => 2,
            Category::Phase => 3,
            Category::Scale => 4,
            Category::Window => 5,
        }
    }

    pub fn scan_kind(self) -> ScanKind {
        match self {
            Category::Scale => ScanKind::Scale,
            Category::Window => ScanKind::Window,
            _ => ScanKind::Value,
        }
    }
}

/// Data-ready notification classes raised at the end of a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanKind {
    /// Raised after every cycle
    Value,
    /// Raised when the frequency scale changed
    Scale,
    /// Raised when the window changed
    Window,
}

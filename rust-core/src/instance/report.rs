//! Human-readable instance summary

use std::fmt;

use crate::channel::ChannelRole;
use crate::spectrum::WindowType;

/// Snapshot of an instance's wiring and last cycle
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceReport {
    pub name: String,
    /// (role, channel name), inputs first
    pub channels: Vec<(ChannelRole, String)>,
    pub trigger: Option<String>,
    pub input_size: usize,
    pub window_type: WindowType,
    pub sample_freq: f64,
    /// Seconds
    pub exec_time: f64,
    pub plan_builds: u64,
    pub valid: bool,
}

impl InstanceReport {
    /// Channel names connected with `role`
    pub fn channels_with(&self, role: ChannelRole) -> impl Iterator<Item = &str> {
        self.channels
            .iter()
            .filter(move |(r, _)| *r == role)
            .map(|(_, name)| name.as_str())
    }
}

impl fmt::Display for InstanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "FFT instance '{}'", self.name)?;

        for role in ChannelRole::ALL {
            let names: Vec<&str> = self.channels_with(role).collect();
            if !names.is_empty() {
                writeln!(f, "  {:<12} {}", role.token(), names.join(", "))?;
            }
        }

        match &self.trigger {
            Some(name) => writeln!(f, "  trigger      {}", name)?,
            None => writeln!(f, "  trigger      (none)")?,
        }
        writeln!(f, "  input size   {}", self.input_size)?;
        writeln!(f, "  window       {}", self.window_type)?;
        writeln!(f, "  fs           {} Hz", self.sample_freq)?;
        writeln!(f, "  exec time    {:.6} s", self.exec_time)?;
        writeln!(f, "  plans built  {}", self.plan_builds)?;
        write!(f, "  result       {}", if self.valid { "valid" } else { "invalid" })
    }
}

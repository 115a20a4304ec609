// Commandline argument parser using clap for MocapRelay

use crate::config::{ReceiverConfig, SenderConfig};
use crate::frame::FrameFormat;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser, Clone)]
#[clap(version, about)]
pub struct RelayArgs {
    #[command(subcommand, long_about)]
    /// Which half of the relay to run
    pub command: CommandTask,

    /// RON file with `send` and `recv` settings. Flags given here win over it
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum CommandTask {
    /// Stream the rows of a delimited text file as UDP frames
    #[command(about)]
    Send(SendCommand),

    /// Receive UDP frames and accumulate them into a table
    #[command(about)]
    Recv(RecvCommand),
}

#[derive(Debug, Args, Clone)]
#[command(version, about)]
pub struct SendCommand {
    /// Delimited text file to stream, one frame per row, no header row
    pub file: PathBuf,

    /// Destination host
    #[arg(long)]
    pub ip: Option<String>,

    /// Destination port
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Seconds to wait between frames, may be 0
    #[arg(short = 'd', long)]
    pub delay: Option<f64>,

    /// Start over from the first row forever, until interrupted
    #[arg(short = 'l', long = "loop")]
    pub looping: bool,

    /// Field separator of the source file
    #[arg(long)]
    pub delimiter: Option<char>,

    /// Packet layout
    #[arg(long, value_enum)]
    pub format: Option<FrameFormat>,

    /// Put this many -1.0 values ahead of every frame, like the upstream producer does
    #[arg(long)]
    pub pad_leading: Option<usize>,
}

#[derive(Debug, Args, Clone)]
#[command(version, about)]
pub struct RecvCommand {
    /// Address to bind
    #[arg(long)]
    pub ip: Option<String>,

    /// Port to bind
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Largest datagram accepted, in bytes
    #[arg(long)]
    pub max_datagram: Option<usize>,

    /// Filename the accumulated frames are written to on exit
    #[arg(short = 'o', long = "out")]
    pub outfile: Option<PathBuf>,

    /// Field separator of the output file
    #[arg(long)]
    pub delimiter: Option<char>,

    /// Packet layout
    #[arg(long, value_enum)]
    pub format: Option<FrameFormat>,

    /// Drop this many leading values from every frame before keeping it
    #[arg(long)]
    pub skip_leading: Option<usize>,

    /// Stop after this many frames have been kept
    #[arg(short = 'n', long)]
    pub max_frames: Option<usize>,

    /// Log progress instead of showing the terminal monitor
    #[arg(long)]
    pub headless: bool,
}

impl SendCommand {
    /// Lay the flags that were actually given over `config`.
    pub fn apply(&self, mut config: SenderConfig) -> SenderConfig {
        if let Some(ip) = &self.ip {
            config.ip = ip.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(delay) = self.delay {
            config.delay = delay;
        }
        config.looping |= self.looping;
        if let Some(delimiter) = self.delimiter {
            config.delimiter = delimiter;
        }
        if let Some(format) = self.format {
            config.format = format;
        }
        if let Some(pad) = self.pad_leading {
            config.pad_leading = pad;
        }
        config
    }
}

impl RecvCommand {
    /// Lay the flags that were actually given over `config`.
    pub fn apply(&self, mut config: ReceiverConfig) -> ReceiverConfig {
        if let Some(ip) = &self.ip {
            config.ip = ip.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(max) = self.max_datagram {
            config.max_datagram = max;
        }
        if let Some(out) = &self.outfile {
            config.out = Some(out.clone());
        }
        if let Some(delimiter) = self.delimiter {
            config.delimiter = delimiter;
        }
        if let Some(format) = self.format {
            config.format = format;
        }
        if let Some(skip) = self.skip_leading {
            config.skip_leading = skip;
        }
        if self.max_frames.is_some() {
            config.max_frames = self.max_frames;
        }
        config.headless |= self.headless;
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_flags_override_config() {
        let args = RelayArgs::try_parse_from([
            "mocap-relay", "send", "data.csv", "--port", "9000", "--loop", "-d", "0",
        ])
        .unwrap();
        let CommandTask::Send(cmd) = args.command else {
            panic!("expected send");
        };
        let config = cmd.apply(SenderConfig::default());
        assert_eq!(cmd.file, PathBuf::from("data.csv"));
        assert_eq!(config.port, 9000);
        assert!(config.looping);
        assert_eq!(config.delay, 0.0);
        assert_eq!(config.ip, "127.0.0.1");
    }

    #[test]
    fn recv_flags_override_config() {
        let args = RelayArgs::try_parse_from([
            "mocap-relay", "recv", "-o", "out.csv", "--format", "headered", "--skip-leading", "15",
            "--headless", "-c", "relay.ron",
        ])
        .unwrap();
        assert_eq!(args.config, Some(PathBuf::from("relay.ron")));
        let CommandTask::Recv(cmd) = args.command else {
            panic!("expected recv");
        };
        let config = cmd.apply(ReceiverConfig::default());
        assert_eq!(config.out, Some(PathBuf::from("out.csv")));
        assert_eq!(config.format, FrameFormat::Headered);
        assert_eq!(config.skip_leading, 15);
        assert!(config.headless);
        assert_eq!(config.port, 7000);
    }

    #[test]
    fn malformed_arguments_are_rejected() {
        assert!(RelayArgs::try_parse_from(["mocap-relay", "send"]).is_err());
        assert!(RelayArgs::try_parse_from(["mocap-relay", "recv", "--port", "huge"]).is_err());
    }
}

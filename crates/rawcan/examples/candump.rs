//! candump 示例
//!
//! 打印接口上收到的所有帧，直到 Ctrl-C。
//!
//! ```bash
//! cargo run -p rawcan --example candump -- vcan0 --timestamps
//! cargo run -p rawcan --example candump -- vcan0 --filter 123:7FF --filter 200:700~
//! cargo run -p rawcan --example candump -- --config rawcan.toml
//! ```

use clap::Parser;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// 打印 CAN / CAN FD 帧
#[derive(Parser, Debug)]
#[command(name = "candump")]
#[command(about = "Dump raw CAN / CAN FD frames", long_about = None)]
struct Args {
    /// 接口名（使用 --config 时可省略）
    interface: Option<String>,

    /// TOML 配置文件
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// 接收过滤器 `<id>:<mask>`（十六进制），末尾加 `~` 表示反选
    #[arg(long = "filter", value_parser = parse_filter)]
    filters: Vec<rawcan::Filter>,

    /// 显示内核接收时间戳
    #[arg(long)]
    timestamps: bool,

    /// 收到指定数量的帧后退出
    #[arg(long)]
    count: Option<u64>,
}

fn parse_filter(s: &str) -> Result<rawcan::Filter, String> {
    let (body, invert) = match s.strip_suffix('~') {
        Some(body) => (body, true),
        None => (s, false),
    };
    let (id, mask) = body
        .split_once(':')
        .ok_or_else(|| format!("expected <id>:<mask>, got '{}'", s))?;
    let id = u32::from_str_radix(id, 16).map_err(|e| format!("bad id '{}': {}", id, e))?;
    let mask = u32::from_str_radix(mask, 16).map_err(|e| format!("bad mask '{}': {}", mask, e))?;
    let filter = rawcan::Filter::new(id, mask);
    Ok(if invert { filter.inverted() } else { filter })
}

#[cfg(target_os = "linux")]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    use rawcan::prelude::*;

    rawcan::logging::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ChannelConfig::from_file(path)?,
        None => ChannelConfig::default(),
    };
    if let Some(interface) = &args.interface {
        config.channel.interface = interface.clone();
    } else if args.config.is_none() {
        return Err("an interface or --config is required".into());
    }
    config.channel.timestamps |= args.timestamps;

    let mut channel = config.open()?;
    channel.set_rx_filters(&args.filters)?;

    let interface = channel.interface().to_string();
    let received = Arc::new(AtomicU64::new(0));
    let counter = received.clone();
    channel.on_message(move |frame: &Frame| {
        counter.fetch_add(1, Ordering::Relaxed);
        println!("{}", format_frame(&interface, frame));
        Ok(())
    })?;
    channel.on_stopped(|| {
        eprintln!("channel stopped");
        Ok(())
    })?;

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || r.store(false, Ordering::SeqCst))?;

    channel.start()?;
    while running.load(Ordering::SeqCst) && channel.is_started() {
        if let Err(e) = channel.process_events(Duration::from_millis(100)) {
            eprintln!("listener error: {}", e);
        }
        if args.count.is_some_and(|n| received.load(Ordering::Relaxed) >= n) {
            break;
        }
    }
    if channel.is_started() {
        channel.stop()?;
    }

    eprintln!("{} frames received", received.load(Ordering::Relaxed));
    Ok(())
}

#[cfg(target_os = "linux")]
fn format_frame(interface: &str, frame: &rawcan::Frame) -> String {
    let stamp = frame
        .timestamp
        .map(|t| format!("({}.{:06}) ", t.sec, t.usec))
        .unwrap_or_default();
    let id = if frame.is_extended() {
        format!("{:08X}", frame.id())
    } else {
        format!("{:03X}", frame.id())
    };
    let body = if frame.is_remote() {
        "remote request".to_string()
    } else {
        frame
            .data()
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect::<Vec<_>>()
            .join(" ")
    };
    let kind = if frame.is_error() {
        " ERROR"
    } else if frame.is_fd() {
        if frame.is_brs() { " FD BRS" } else { " FD" }
    } else {
        ""
    };
    format!(
        "{}{}  {}  [{:02}]{}  {}",
        stamp,
        interface,
        id,
        frame.len(),
        kind,
        body
    )
}

#[cfg(not(target_os = "linux"))]
fn main() {
    let _ = Args::parse();
    eprintln!("candump requires Linux SocketCAN");
}

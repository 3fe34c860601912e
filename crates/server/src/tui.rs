use std::collections::{HashMap, VecDeque};
use std::net::{IpAddr, SocketAddr};

use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Gauge, Paragraph};

use dogfight::{NetworkStats, PlayerId, PlayerState};

use crate::events::Severity;

const MAX_LOG_LINES: usize = 200;

pub struct Dashboard {
    pub local_addr: Option<SocketAddr>,
    pub lan_ip: IpAddr,
    pub uptime_secs: u64,
    pub tick: u32,
    pub peer_count: usize,
    pub max_peers: usize,
    pub roster: Vec<PlayerState>,
    /// Seconds since each client joined. The host itself has no entry.
    pub connected_secs: HashMap<PlayerId, u64>,
    pub network: NetworkStats,
}

#[derive(Default)]
pub struct TuiState {
    logs: VecDeque<(Severity, String)>,
}

impl TuiState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&mut self, severity: Severity, line: impl Into<String>) {
        if self.logs.len() == MAX_LOG_LINES {
            self.logs.pop_front();
        }
        self.logs.push_back((severity, line.into()));
    }
}

pub fn render(frame: &mut Frame, state: &TuiState, dashboard: &Dashboard) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(11),
            Constraint::Length(6),
            Constraint::Min(3),
            Constraint::Length(3),
        ])
        .split(frame.area());

    render_header(frame, chunks[0], dashboard);
    render_capacity(frame, chunks[1], dashboard);
    render_roster(frame, chunks[2], dashboard);
    render_network(frame, chunks[3], &dashboard.network);
    render_log(frame, chunks[4], state);
    render_help(frame, chunks[5]);
}

fn render_header(frame: &mut Frame, area: Rect, dashboard: &Dashboard) {
    let title = format!(
        " Dogfight Host - Uptime: {} ",
        format_duration(dashboard.uptime_secs)
    );
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let port = dashboard.local_addr.map_or(0, |addr| addr.port());
    let text = format!(
        "Join at {}:{}  |  Tick: {}",
        dashboard.lan_ip, port, dashboard.tick
    );

    let paragraph = Paragraph::new(text)
        .block(block)
        .style(Style::default().fg(Color::White));
    frame.render_widget(paragraph, area);
}

fn render_capacity(frame: &mut Frame, area: Rect, dashboard: &Dashboard) {
    let block = Block::default()
        .title(" Peers ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Green));

    let ratio = dashboard.peer_count as f64 / dashboard.max_peers.max(1) as f64;
    let gauge = Gauge::default()
        .block(block)
        .gauge_style(Style::default().fg(Color::Green))
        .ratio(ratio.min(1.0))
        .label(format!(
            "{}/{} peers",
            dashboard.peer_count, dashboard.max_peers
        ));
    frame.render_widget(gauge, area);
}

fn render_roster(frame: &mut Frame, area: Rect, dashboard: &Dashboard) {
    let block = Block::default()
        .title(" Roster ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Magenta));

    let lines: Vec<Line> = dashboard
        .roster
        .iter()
        .map(|state| {
            let status = if state.is_placeholder() {
                Span::styled("waiting", Style::default().fg(Color::DarkGray))
            } else if state.alive {
                Span::styled("alive", Style::default().fg(Color::Green))
            } else {
                Span::styled("down", Style::default().fg(Color::Red))
            };

            let connected = match dashboard.connected_secs.get(&state.id) {
                Some(secs) => format!("up {}  ", format_duration(*secs)),
                None => "host         ".to_string(),
            };

            Line::from(vec![
                Span::styled(
                    format!("#{:<3}", state.id),
                    Style::default().fg(Color::Gray),
                ),
                Span::styled(connected, Style::default().fg(Color::DarkGray)),
                Span::styled(
                    format!(
                        "({:>7.1}, {:>6.1}, {:>7.1})  hp {:>3}  seq {:>6}  ",
                        state.position[0],
                        state.position[1],
                        state.position[2],
                        state.health,
                        state.sequence
                    ),
                    Style::default().fg(Color::White),
                ),
                status,
            ])
        })
        .collect();

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_network(frame: &mut Frame, area: Rect, net: &NetworkStats) {
    let block = Block::default()
        .title(" Network ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));

    let lines = vec![
        Line::from(vec![
            Span::styled("Packets: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{} sent / {} recv", net.packets_sent, net.packets_received),
                Style::default().fg(Color::White),
            ),
        ]),
        Line::from(vec![
            Span::styled("Bytes: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!(
                    "{} sent / {} recv",
                    format_bytes(net.bytes_sent),
                    format_bytes(net.bytes_received)
                ),
                Style::default().fg(Color::White),
            ),
        ]),
        Line::from(vec![
            Span::styled("Dropped: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!(
                    "{} simulated / {} rejected",
                    net.packets_lost, net.rejected_datagrams
                ),
                Style::default().fg(if net.rejected_datagrams > 0 {
                    Color::Red
                } else {
                    Color::White
                }),
            ),
        ]),
        Line::from(vec![
            Span::styled("Errors: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{} send / {} recv", net.send_errors, net.receive_errors),
                Style::default().fg(Color::White),
            ),
        ]),
    ];

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_log(frame: &mut Frame, area: Rect, state: &TuiState) {
    let block = Block::default()
        .title(" Events ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Blue));

    let visible = area.height.saturating_sub(2) as usize;
    let lines: Vec<Line> = state
        .logs
        .iter()
        .skip(state.logs.len().saturating_sub(visible))
        .map(|(severity, text)| {
            let color = match severity {
                Severity::Info => Color::White,
                Severity::Warn => Color::Yellow,
            };
            Line::from(Span::styled(text.as_str(), Style::default().fg(color)))
        })
        .collect();

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_help(frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .title(" Controls ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let text = Paragraph::new("Press 'q' or ESC to stop hosting")
        .block(block)
        .style(
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
        );
    frame.render_widget(text, area);
}

fn format_duration(secs: u64) -> String {
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let secs = secs % 60;
    format!("{:02}:{:02}:{:02}", hours, mins, secs)
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{}B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1}KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1}MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

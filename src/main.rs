use anyhow::Result;
use crossterm::{
    cursor,
    event::{self, Event, KeyCode},
    execute, queue,
    style::{self, Color as CColor},
    terminal,
};
use std::io::{self, Write, stdout};
use std::time::{Duration, Instant};

mod audio;
mod game;
mod render;
mod score;

use audio::MicSensor;
use game::{Game, State, WORLD_HEIGHT};
use render::PixelBuf;
use score::FileStore;

// One simulation tick is one 16ms frame; dt is measured in ticks.
const TICK: Duration = Duration::from_millis(16);
const MAX_DT: f64 = 3.0;

fn viewport_width(pw: usize, ph: usize) -> f64 {
    WORLD_HEIGHT * pw as f64 / ph.max(1) as f64
}

fn main() -> Result<()> {
    terminal::enable_raw_mode()?;
    let mut out = stdout();
    execute!(
        out,
        terminal::EnterAlternateScreen,
        cursor::Hide,
        terminal::DisableLineWrap,
    )?;

    let cleanup = |out: &mut io::Stdout| -> io::Result<()> {
        execute!(
            out,
            terminal::LeaveAlternateScreen,
            cursor::Show,
            terminal::EnableLineWrap,
        )?;
        terminal::disable_raw_mode()
    };

    let result = run(&mut out);
    cleanup(&mut out)?;
    result
}

fn run(out: &mut io::Stdout) -> Result<()> {
    let (cols, rows) = terminal::size()?;
    let pw = cols as usize;
    let ph = rows as usize * 2;

    let mut buf = PixelBuf::new(pw, ph);
    let mut game = Game::new(
        viewport_width(pw, ph),
        Box::new(FileStore::at_default_path()),
    );
    let mut sensor = MicSensor::new();
    let mut mic_error: Option<String> = None;

    let mut last_frame = Instant::now();

    loop {
        let frame_start = Instant::now();

        // Input
        while event::poll(Duration::ZERO)? {
            match event::read()? {
                Event::Key(key) => match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                    KeyCode::Char(' ') | KeyCode::Enter => match game.state {
                        // The game never starts without an active sensor.
                        State::Start => match sensor.initialize() {
                            Ok(()) => {
                                mic_error = None;
                                game.start();
                            }
                            Err(e) => mic_error = Some(format!("microphone unavailable: {e:#}")),
                        },
                        State::Playing => {}
                        State::End => {
                            game.reset();
                            if sensor.initialize().is_ok() {
                                game.start();
                            }
                        }
                    },
                    _ => {}
                },
                Event::Resize(c, r) => {
                    let npw = c as usize;
                    let nph = r as usize * 2;
                    buf.resize(npw, nph);
                    game.set_viewport_width(viewport_width(npw, nph));
                }
                _ => {}
            }
        }

        // Update: one sensor read, one physics step per frame.
        let dt = (last_frame.elapsed().as_secs_f64() / TICK.as_secs_f64()).min(MAX_DT);
        last_frame = Instant::now();
        let wind = sensor.level();
        game.update(dt, wind as f64);

        // Render
        render::draw_frame(&game, &mut buf, wind);
        buf.render(out)?;
        draw_messages(out, &game, &sensor, mic_error.as_deref())?;

        // Frame pacing
        let elapsed = frame_start.elapsed();
        if elapsed < TICK {
            std::thread::sleep(TICK - elapsed);
        }
    }
}

fn draw_messages(
    out: &mut io::Stdout,
    game: &Game,
    sensor: &MicSensor,
    mic_error: Option<&str>,
) -> io::Result<()> {
    let (cols, rows) = terminal::size()?;
    let center = |msg: &str| cols.saturating_sub(msg.len() as u16) / 2;

    match game.state {
        State::Start => {
            let title = "P A P E R  W I N G S";
            let hint = if sensor.is_active() {
                "press SPACE to launch, then keep blowing into the mic"
            } else {
                "press SPACE to enable the microphone and start"
            };
            queue!(
                out,
                cursor::MoveTo(center(title), rows / 3),
                style::SetForegroundColor(CColor::White),
                style::Print(title),
                cursor::MoveTo(center(hint), rows / 3 + 2),
                style::SetForegroundColor(CColor::Grey),
                style::Print(hint),
            )?;
            if let Some(err) = mic_error {
                queue!(
                    out,
                    cursor::MoveTo(center(err), rows / 3 + 4),
                    style::SetForegroundColor(CColor::Red),
                    style::Print(err),
                )?;
            }
        }
        State::Playing => {}
        State::End => {
            let over = "the flight is over";
            let hint = "SPACE to fold a new plane, q to quit";
            queue!(
                out,
                cursor::MoveTo(center(over), rows / 2 - 3),
                style::SetForegroundColor(CColor::White),
                style::Print(over),
                cursor::MoveTo(center(hint), rows / 2 + 3),
                style::SetForegroundColor(CColor::Grey),
                style::Print(hint),
            )?;
        }
    }
    queue!(out, style::ResetColor)?;
    out.flush()
}

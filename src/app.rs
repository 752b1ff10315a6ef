use crate::clock::{Clock, MonotonicClock};
use crate::config::{resolve, Args, RenderConfig, Settings};
use crate::controller::AnimationController;
use crate::input::{collect_input_nonblocking, map_event, Action};
use crate::render::Terminal;
use crate::snapshot::FrameSnapshot;
use rand::{rngs::StdRng, SeedableRng};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

pub(crate) struct App {
    render: RenderConfig,
    ctrl: AnimationController<StdRng>,
    clock: MonotonicClock,
    term: Terminal,
    should_quit: bool,
}

fn seed_or_time(seed: Option<u64>) -> u64 {
    seed.unwrap_or_else(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0xC0FFEE)
    })
}

impl App {
    fn init(settings: Settings) -> anyhow::Result<Self> {
        let seed = seed_or_time(settings.seed);
        log::info!("seed {seed}");

        let clock = MonotonicClock::new();
        let ctrl = AnimationController::new(&settings, StdRng::seed_from_u64(seed), clock.now_ms());
        let term = Terminal::begin()?;

        Ok(Self {
            render: settings.render,
            ctrl,
            clock,
            term,
            should_quit: false,
        })
    }

    fn run(&mut self) -> anyhow::Result<()> {
        let fps = self.render.fps_cap.clamp(10, 240);
        let frame_dt = Duration::from_secs_f32(1.0 / fps as f32);

        while !self.should_quit {
            let frame_start = Instant::now();
            self.term.resize_if_needed()?;

            for ev in collect_input_nonblocking(frame_dt)? {
                match map_event(&ev) {
                    Some(Action::Quit) => {
                        self.should_quit = true;
                        break;
                    }
                    Some(Action::Stop) => self.ctrl.stop(),
                    None => {}
                }
            }

            let now = self.clock.now_ms();
            if let Some(phase) = self.ctrl.tick(now) {
                log::debug!("phase -> {phase:?} at {now:.0}ms");
            }

            let snap = FrameSnapshot::capture(&self.ctrl, now, &self.render);
            self.term.draw(&snap, self.render.enable_color);
            self.term.present(true)?;

            spin_sleep(frame_dt, frame_start);
        }
        Ok(())
    }
}

pub(crate) fn run(args: &Args) -> anyhow::Result<()> {
    let settings = resolve(args)?;
    if args.print_config {
        println!("{}", serde_json::to_string_pretty(&settings)?);
        return Ok(());
    }

    let mut app = App::init(settings)?;
    let result = app.run();
    // restore the terminal even when the loop failed
    app.term.end()?;
    result
}

/* -----------------------------
   Frame pacing helper
------------------------------ */

fn spin_sleep(target: Duration, start: Instant) {
    let end = start + target;
    loop {
        let t = Instant::now();
        if t >= end {
            break;
        }
        let left = end - t;
        if left > Duration::from_millis(2) {
            std::thread::sleep(Duration::from_millis(1));
        } else {
            std::hint::spin_loop();
        }
    }
}

use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::score::ScoreStore;

// World units match the tuning the game was balanced at: the viewport is
// always 600 units tall and as wide as the terminal's aspect ratio allows.
pub const WORLD_HEIGHT: f64 = 600.0;
/// Height of the ground band below the crash line.
pub const GROUND_BAND: f64 = 150.0;
/// World x of the launch stand; distance is measured from here.
pub const STAND_X: f64 = 100.0;
/// World units per displayed meter.
pub const METER: f64 = 50.0;

const BLOW_THRESHOLD: f64 = 0.60;
const BLOW_THRUST: f64 = 1.2;
const BLOW_LIFT: f64 = 0.5;
const SPEED_LIFT: f64 = 0.02;
const GRAVITY: f64 = 0.75;
const DRAG: f64 = 0.98;
const MAX_FALL_SPEED: f64 = 10.0;
const MAX_FORWARD_SPEED: f64 = 20.0;
const ANGLE_KEEP: f64 = 0.9; // fraction of the old angle kept per tick
const CAMERA_LEAD: f64 = 0.3;
const STAND_HEIGHT_FRAC: f64 = 0.6;
const CEILING_FRAC: f64 = 0.2;

const MAX_CLOUDS: usize = 15;
const CLOUD_SPAWN_CHANCE: f64 = 0.05;
pub const CLOUD_PARALLAX: f64 = 0.5;
const CLOUD_CULL_X: f64 = -100.0;

const PARTICLE_CHANCE: f64 = 0.5;
const PARTICLE_DECAY: f64 = 0.05;

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum State {
    Start,
    Playing,
    End,
}

pub struct Airplane {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub angle: f64,
    pub scale: f64,
    /// One-way latch: trips on the first breath over the threshold and stays
    /// set until the next reset. While clear the plane is held on the stand.
    pub has_started_blowing: bool,
    /// Reserved. Always true; kept for parity with the original tuning.
    pub can_blow: bool,
}

pub struct Cloud {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub speed: f64,
}

pub struct Particle {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub life: f64,
}

pub struct Game {
    pub viewport_w: f64,
    pub viewport_h: f64,
    pub plane: Airplane,
    pub camera_x: f64,
    pub clouds: Vec<Cloud>,
    pub particles: Vec<Particle>,
    pub state: State,
    pub distance: f64,
    pub high_score: f64,
    store: Box<dyn ScoreStore>,
    rng: StdRng,
}

impl Game {
    pub fn new(viewport_w: f64, store: Box<dyn ScoreStore>) -> Self {
        let high_score = store.load();
        let mut g = Game {
            viewport_w,
            viewport_h: WORLD_HEIGHT,
            plane: Airplane {
                x: STAND_X,
                y: 0.0,
                vx: 0.0,
                vy: 0.0,
                angle: 0.0,
                scale: 1.6,
                has_started_blowing: false,
                can_blow: true,
            },
            camera_x: 0.0,
            clouds: Vec::new(),
            particles: Vec::new(),
            state: State::Start,
            distance: 0.0,
            high_score,
            store,
            rng: StdRng::from_entropy(),
        };
        g.plane.y = g.stand_y();
        g
    }

    pub fn set_viewport_width(&mut self, viewport_w: f64) {
        self.viewport_w = viewport_w;
    }

    pub fn ground_y(&self) -> f64 {
        self.viewport_h - GROUND_BAND
    }

    pub fn ceiling_y(&self) -> f64 {
        self.viewport_h * CEILING_FRAC
    }

    pub fn stand_y(&self) -> f64 {
        self.viewport_h * STAND_HEIGHT_FRAC
    }

    pub fn start(&mut self) {
        self.state = State::Playing;
    }

    /// Puts the airplane back on the stand for a fresh run. The best
    /// distance survives resets.
    pub fn reset(&mut self) {
        self.plane.x = STAND_X;
        self.plane.y = self.stand_y();
        self.plane.vx = 0.0;
        self.plane.vy = 0.0;
        self.plane.angle = 0.0;
        self.plane.has_started_blowing = false;
        self.plane.can_blow = true;
        self.camera_x = 0.0;
        self.distance = 0.0;
        self.clouds.clear();
        self.particles.clear();
        self.state = State::Start;
    }

    /// Advances the simulation by `dt` ticks (1.0 == one 16ms frame) under
    /// wind force `wind` in [0,1]. Does nothing outside the playing state.
    pub fn update(&mut self, dt: f64, wind: f64) {
        if self.state != State::Playing {
            return;
        }

        let was_airborne = self.plane.has_started_blowing;

        // Breath above the threshold launches the plane and keeps pushing it.
        if wind > BLOW_THRESHOLD && self.plane.can_blow {
            self.plane.has_started_blowing = true;
            self.plane.vx += wind * BLOW_THRUST * dt;
            self.plane.vy -= wind * BLOW_LIFT * dt;
            if self.rng.gen_bool(PARTICLE_CHANCE) {
                self.emit_breath_particle();
            }
        }

        // Forward speed generates lift.
        self.plane.vy -= self.plane.vx.abs() * SPEED_LIFT * dt;

        if was_airborne {
            self.plane.vy += GRAVITY * dt;
        } else if !self.plane.has_started_blowing {
            // Hold state: pinned to the stand until the first real breath.
            self.plane.vx = 0.0;
            self.plane.vy = 0.0;
            self.plane.y = self.stand_y();
        }
        // On the launch frame itself gravity has not taken hold yet.

        let drag = DRAG.powf(dt);
        self.plane.vx *= drag;
        self.plane.vy *= drag;

        self.plane.vy = self.plane.vy.min(MAX_FALL_SPEED);
        self.plane.vx = self.plane.vx.min(MAX_FORWARD_SPEED);

        self.plane.x += self.plane.vx * dt;
        self.plane.y += self.plane.vy * dt;

        let target = self.plane.vy.atan2(self.plane.vx);
        self.plane.angle += (target - self.plane.angle) * (1.0 - ANGLE_KEEP.powf(dt));

        self.distance = ((self.plane.x - STAND_X) / METER).max(0.0);
        self.camera_x = (self.plane.x - CAMERA_LEAD * self.viewport_w).max(0.0);

        if self.plane.y > self.ground_y() {
            self.crash();
            return;
        }

        let ceiling = self.ceiling_y();
        if self.plane.y < ceiling {
            self.plane.y = ceiling;
            self.plane.vy *= 0.5;
        }

        self.update_clouds(dt);
        self.update_particles(dt);
    }

    fn crash(&mut self) {
        self.state = State::End;
        if self.distance > self.high_score {
            self.high_score = self.distance;
            self.store.save(self.high_score);
        }
    }

    fn emit_breath_particle(&mut self) {
        let p = Particle {
            x: self.plane.x - self.rng.gen_range(10.0..25.0),
            y: self.plane.y + self.rng.gen_range(-8.0..8.0),
            vx: -self.rng.gen_range(1.0..3.0),
            vy: self.rng.gen_range(-0.5..0.5),
            life: 1.0,
        };
        self.particles.push(p);
    }

    fn update_clouds(&mut self, dt: f64) {
        let furthest = self
            .clouds
            .iter()
            .map(|c| c.x)
            .fold(f64::NEG_INFINITY, f64::max);
        let horizon = CLOUD_PARALLAX * self.camera_x + self.viewport_w;
        let wants_more = self.clouds.len() < MAX_CLOUDS || furthest < horizon;
        if wants_more && self.rng.gen_bool(CLOUD_SPAWN_CHANCE) {
            let cloud = Cloud {
                x: horizon + self.rng.gen_range(0.0..300.0),
                y: self.rng.gen_range(30.0..self.viewport_h * 0.55),
                width: self.rng.gen_range(40.0..120.0),
                speed: self.rng.gen_range(0.2..0.8),
            };
            self.clouds.push(cloud);
        }

        let camera_x = self.camera_x;
        for c in &mut self.clouds {
            c.x -= c.speed * dt;
        }
        self.clouds
            .retain(|c| c.x - CLOUD_PARALLAX * camera_x + c.width > CLOUD_CULL_X);
    }

    fn update_particles(&mut self, dt: f64) {
        for p in &mut self.particles {
            p.x += p.vx * dt;
            p.y += p.vy * dt;
            p.life -= PARTICLE_DECAY * dt;
        }
        self.particles.retain(|p| p.life > 0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct SharedStore {
        best: Rc<RefCell<f64>>,
        saves: Rc<RefCell<u32>>,
    }

    impl ScoreStore for SharedStore {
        fn load(&self) -> f64 {
            *self.best.borrow()
        }

        fn save(&mut self, best: f64) {
            *self.best.borrow_mut() = best;
            *self.saves.borrow_mut() += 1;
        }
    }

    fn game_800x600() -> (Game, SharedStore) {
        let store = SharedStore::default();
        let mut g = Game::new(800.0, Box::new(store.clone()));
        g.start();
        (g, store)
    }

    #[test]
    fn stays_pinned_on_stand_without_breath() {
        let (mut g, _) = game_800x600();
        for _ in 0..100 {
            g.update(1.0, 0.0);
            assert_eq!(g.plane.vx, 0.0);
            assert_eq!(g.plane.vy, 0.0);
            assert_eq!(g.plane.y, 360.0);
        }
        assert_eq!(g.distance, 0.0);
        assert!(!g.plane.has_started_blowing);
        assert_eq!(g.state, State::Playing);
    }

    #[test]
    fn strong_breath_launches_from_rest() {
        let (mut g, _) = game_800x600();
        g.update(1.0, 0.8);
        assert!(g.plane.has_started_blowing);
        assert!(g.plane.vx > 0.0);
        assert!(g.plane.vy < 0.0, "launch frame should push the plane up");
    }

    #[test]
    fn weak_breath_does_not_trip_the_latch() {
        let (mut g, _) = game_800x600();
        for _ in 0..50 {
            g.update(1.0, 0.6); // exactly at the threshold, not over it
        }
        assert!(!g.plane.has_started_blowing);
        assert_eq!(g.plane.y, 360.0);
    }

    #[test]
    fn latch_stays_set_once_tripped() {
        let (mut g, _) = game_800x600();
        g.update(1.0, 0.9);
        for _ in 0..20 {
            g.update(1.0, 0.0);
            assert!(g.plane.has_started_blowing);
        }
        g.reset();
        assert!(!g.plane.has_started_blowing);
        assert!(g.plane.can_blow);
    }

    #[test]
    fn gravity_takes_hold_after_the_launch_frame() {
        let (mut g, _) = game_800x600();
        g.update(1.0, 0.8);
        let vy_after_launch = g.plane.vy;
        g.update(1.0, 0.0);
        assert!(g.plane.vy > vy_after_launch);
    }

    #[test]
    fn distance_tracks_x_and_never_goes_negative() {
        let (mut g, _) = game_800x600();
        g.plane.has_started_blowing = true;
        g.plane.x = 2215.0;
        g.plane.y = 300.0;
        g.update(1.0, 0.0);
        assert!((g.distance - (g.plane.x - 100.0) / 50.0).abs() < 1e-9);

        let mut last = 0.0;
        for _ in 0..200 {
            g.update(1.0, 0.8);
            if g.state != State::Playing {
                break;
            }
            assert!(g.distance >= last);
            assert!(g.distance >= 0.0);
            last = g.distance;
        }
    }

    #[test]
    fn camera_trails_the_plane_and_never_goes_negative() {
        let (mut g, _) = game_800x600();
        g.update(1.0, 0.0);
        assert_eq!(g.camera_x, 0.0);

        g.plane.has_started_blowing = true;
        g.plane.x = 1000.0;
        g.plane.y = 300.0;
        g.update(1.0, 0.0);
        assert!((g.camera_x - (g.plane.x - 0.3 * 800.0)).abs() < 1e-9);
    }

    #[test]
    fn hitting_the_ground_ends_the_run_and_freezes_distance() {
        let (mut g, _) = game_800x600();
        g.plane.has_started_blowing = true;
        g.plane.x = 2215.0;
        g.plane.y = 460.0; // ground line sits at 450
        g.update(1.0, 0.0);
        assert_eq!(g.state, State::End);

        let frozen = g.distance;
        g.update(1.0, 1.0);
        assert_eq!(g.state, State::End);
        assert_eq!(g.distance, frozen);
    }

    #[test]
    fn ceiling_clamps_and_halves_vertical_speed_without_crashing() {
        let (mut g, _) = game_800x600();
        g.plane.has_started_blowing = true;
        g.plane.x = 500.0;
        g.plane.y = 125.0; // ceiling sits at 120
        g.plane.vy = -6.0;
        g.update(1.0, 0.0);
        assert_eq!(g.state, State::Playing);
        assert_eq!(g.plane.y, 120.0);
        // After lift, drag and the clamp, vy is half of what it would be.
        assert!(g.plane.vy > -6.0 && g.plane.vy < 0.0);
    }

    #[test]
    fn crash_persists_a_strictly_better_distance() {
        let (mut g, store) = game_800x600();
        g.plane.has_started_blowing = true;
        g.plane.x = 2215.0;
        g.plane.y = 500.0;
        g.update(1.0, 0.0);
        assert_eq!(g.state, State::End);
        assert!((*store.best.borrow() - 42.3).abs() < 1e-6);
        assert_eq!(*store.saves.borrow(), 1);
    }

    #[test]
    fn crash_keeps_the_old_best_when_not_beaten() {
        let store = SharedStore::default();
        store.best.replace(100.0);
        let mut g = Game::new(800.0, Box::new(store.clone()));
        g.start();
        assert_eq!(g.high_score, 100.0);

        g.plane.has_started_blowing = true;
        g.plane.x = 2215.0;
        g.plane.y = 500.0;
        g.update(1.0, 0.0);
        assert_eq!(g.state, State::End);
        assert_eq!(*store.best.borrow(), 100.0);
        assert_eq!(*store.saves.borrow(), 0);
    }

    #[test]
    fn forward_speed_is_capped() {
        let (mut g, _) = game_800x600();
        for _ in 0..500 {
            g.plane.y = 300.0; // keep it flying, only speed matters here
            g.update(1.0, 1.0);
            assert!(g.plane.vx <= 20.0);
            assert!(g.plane.vy <= 10.0);
        }
    }

    #[test]
    fn particles_fade_out_and_get_culled() {
        let (mut g, _) = game_800x600();
        g.particles.push(Particle {
            x: 100.0,
            y: 300.0,
            vx: -2.0,
            vy: 0.0,
            life: 1.0,
        });
        g.plane.has_started_blowing = true;
        g.plane.y = 300.0;
        g.update(1.0, 0.0);
        assert!((g.particles[0].life - 0.95).abs() < 1e-9);
        assert!(g.particles[0].x < 100.0);
        for _ in 0..25 {
            g.plane.y = 300.0;
            g.update(1.0, 0.0);
        }
        assert!(g.particles.is_empty());
    }

    #[test]
    fn clouds_drift_and_are_culled_behind_the_camera() {
        let (mut g, _) = game_800x600();
        g.clouds.push(Cloud {
            x: 500.0,
            y: 100.0,
            width: 60.0,
            speed: 1.0,
        });
        g.plane.has_started_blowing = true;
        g.plane.y = 300.0;
        g.update(1.0, 0.0);
        assert!(g.clouds[0].x < 500.0);

        // Fully past the left edge under parallax: culled on the next step.
        g.camera_x = 0.0;
        g.clouds[0].x = -200.0;
        g.plane.y = 300.0;
        g.update(1.0, 0.0);
        assert!(g.clouds.iter().all(|c| c.x > -150.0));
    }

    #[test]
    fn angle_eases_toward_the_velocity_direction() {
        let (mut g, _) = game_800x600();
        g.plane.has_started_blowing = true;
        g.plane.y = 300.0;
        g.plane.vx = 10.0;
        g.update(1.0, 0.0);
        let target = g.plane.vy.atan2(g.plane.vx);
        assert!(target > 0.0);
        // One step covers 10% of the gap, no more.
        assert!(g.plane.angle > 0.0 && g.plane.angle < target);
        assert!((g.plane.angle - 0.1 * target).abs() < 1e-9);
    }
}

//! A pixel game: catch falling balls with a paddle.
use anyhow::{bail, Result};
use kestrel_core::{FrameEnv, FrameShape};
use serde::{Deserialize, Serialize};

const NOOP: i32 = 0;
const LEFT: i32 = 1;
const RIGHT: i32 = 2;
const FIRE: i32 = 3;

const BALL: u8 = 255;
const PADDLE: u8 = 128;

/// Configuration of [`CatchEnv`].
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct CatchConfig {
    /// Shape of the screen.
    pub frame_shape: FrameShape,

    /// Width of the paddle in pixels.
    pub paddle_width: usize,

    /// Balls per episode.
    pub n_balls: usize,

    /// Raw frames per visible step.
    pub frame_skip: usize,
}

impl Default for CatchConfig {
    fn default() -> Self {
        Self {
            frame_shape: FrameShape::new(12, 12),
            paddle_width: 3,
            n_balls: 5,
            frame_skip: 1,
        }
    }
}

/// Balls fall one row per raw frame from a random column of the top row; the
/// paddle on the bottom row moves one pixel per raw frame.
///
/// A caught ball pays 1, a missed one -1. The episode ends after `n_balls`
/// balls. Action 3 (fire) is legal but does nothing, so the minimal action
/// set is noop, left and right.
pub struct CatchEnv {
    config: CatchConfig,
    rng: fastrand::Rng,
    ball: (usize, usize),
    paddle: usize,
    balls_left: usize,
    frame: usize,
}

impl CatchEnv {
    fn drop_ball(&mut self) {
        self.ball = (0, self.rng.usize(0..self.config.frame_shape.width));
    }

    /// Row and column of the ball.
    pub fn ball(&self) -> (usize, usize) {
        self.ball
    }

    /// Leftmost column of the paddle.
    pub fn paddle(&self) -> usize {
        self.paddle
    }
}

impl FrameEnv for CatchEnv {
    type Config = CatchConfig;

    fn build(config: &Self::Config, seed: i64) -> Result<Self> {
        let shape = config.frame_shape;
        if shape.height < 2 || config.paddle_width == 0 || config.paddle_width > shape.width {
            bail!("Invalid catch configuration: {:?}", config);
        }
        let mut env = Self {
            config: config.clone(),
            rng: fastrand::Rng::with_seed(seed as u64),
            ball: (0, 0),
            paddle: 0,
            balls_left: config.n_balls,
            frame: 0,
        };
        env.reset()?;
        Ok(env)
    }

    fn frame_shape(&self) -> FrameShape {
        self.config.frame_shape
    }

    fn frame_skip(&self) -> usize {
        self.config.frame_skip
    }

    fn legal_action_set(&self) -> Vec<i32> {
        vec![NOOP, LEFT, RIGHT, FIRE]
    }

    fn minimal_action_set(&self) -> Vec<i32> {
        vec![NOOP, LEFT, RIGHT]
    }

    fn act(&mut self, action: i32) -> Result<f32> {
        let max_paddle = self.config.frame_shape.width - self.config.paddle_width;
        match action {
            LEFT => self.paddle = self.paddle.saturating_sub(1),
            RIGHT => self.paddle = (self.paddle + 1).min(max_paddle),
            NOOP | FIRE => {}
            _ => bail!("Action {} is not legal", action),
        }
        self.frame += 1;

        if self.is_terminal() {
            return Ok(0.0);
        }

        self.ball.0 += 1;
        if self.ball.0 + 1 < self.config.frame_shape.height {
            return Ok(0.0);
        }

        // the ball reached the paddle row
        let caught = (self.paddle..self.paddle + self.config.paddle_width).contains(&self.ball.1);
        self.balls_left -= 1;
        self.drop_ball();
        Ok(if caught { 1.0 } else { -1.0 })
    }

    fn is_terminal(&self) -> bool {
        self.balls_left == 0
    }

    fn reset(&mut self) -> Result<()> {
        self.balls_left = self.config.n_balls;
        self.paddle = (self.config.frame_shape.width - self.config.paddle_width) / 2;
        self.frame = 0;
        self.drop_ball();
        Ok(())
    }

    fn observation(&self, out: &mut [u8]) {
        let FrameShape { height, width } = self.config.frame_shape;
        out.iter_mut().for_each(|p| *p = 0);
        let bottom = (height - 1) * width;
        out[bottom + self.paddle..bottom + self.paddle + self.config.paddle_width]
            .iter_mut()
            .for_each(|p| *p = PADDLE);
        if !self.is_terminal() {
            out[self.ball.0 * width + self.ball.1] = BALL;
        }
    }

    fn episode_frame_number(&self) -> usize {
        self.frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> CatchEnv {
        CatchEnv::build(&CatchConfig::default(), 3).unwrap()
    }

    // Moves the paddle under the ball.
    fn chase(env: &CatchEnv) -> i32 {
        let center = env.paddle() + 1;
        match env.ball().1 {
            c if c < center => LEFT,
            c if c > center => RIGHT,
            _ => NOOP,
        }
    }

    #[test]
    fn test_chasing_catches_every_ball() -> Result<()> {
        let mut env = env();
        let mut total = 0.0;
        while !env.is_terminal() {
            total += env.act(chase(&env))?;
        }
        assert_eq!(total, 5.0);
        assert_eq!(env.episode_frame_number(), 5 * 11);
        Ok(())
    }

    #[test]
    fn test_observation_shows_ball_and_paddle() {
        let env = env();
        let mut frame = vec![0u8; 144];
        env.observation(&mut frame);
        assert_eq!(frame.iter().filter(|&&p| p == BALL).count(), 1);
        assert_eq!(frame.iter().filter(|&&p| p == PADDLE).count(), 3);
        assert_eq!(frame[..12].iter().filter(|&&p| p == BALL).count(), 1);
    }

    #[test]
    fn test_illegal_action() {
        assert!(env().act(7).is_err());
    }
}

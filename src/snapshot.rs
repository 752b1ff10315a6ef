//! Everything a renderer needs for one frame, detached from the simulation.

use crate::color::{Gradient, Rgb};
use crate::config::{ConstellationStyle, RenderConfig};
use crate::controller::{AnimationController, Phase};
use crate::field::{visual_state, Point};
use rand::Rng;

#[derive(Clone, Copy, Debug)]
pub(crate) struct DotView {
    pub(crate) pos: Point,
    pub(crate) color: Rgb,
    pub(crate) alpha: f64,
    /// Diameter in field units.
    pub(crate) size: f64,
}

#[derive(Clone, Debug)]
pub(crate) struct PathView {
    /// Revealed part of the path, start first.
    pub(crate) points: Vec<Point>,
    pub(crate) color: Rgb,
    pub(crate) progress: f64,
    pub(crate) style: ConstellationStyle,
    pub(crate) fill_alpha: f64,
    pub(crate) stroke_alpha: f64,
    pub(crate) stroke_width: f64,
    pub(crate) section: (f64, f64),
}

#[derive(Clone, Debug)]
pub(crate) struct FrameSnapshot {
    pub(crate) width: f64,
    pub(crate) height: f64,
    pub(crate) gradient: Gradient,
    pub(crate) phase: Phase,
    pub(crate) running: bool,
    pub(crate) dots: Vec<DotView>,
    pub(crate) path: Option<PathView>,
    /// Current constellation extent, percent of usable width.
    pub(crate) width_percent: Option<f64>,
    pub(crate) average_width: f64,
    pub(crate) average_x: f64,
    /// Position on the scale matching the constellation's colour.
    pub(crate) risk_center: Option<f64>,
}

impl FrameSnapshot {
    pub(crate) fn capture<R: Rng>(
        ctrl: &AnimationController<R>,
        now: f64,
        render: &RenderConfig,
    ) -> Self {
        let field = ctrl.field();
        let cfg = field.config();
        let shown_since = ctrl.shown_since();

        let dots = field
            .particles()
            .iter()
            .map(|p| {
                let v = visual_state(p, now, shown_since, ctrl.fade());
                DotView {
                    pos: p.pos,
                    color: field.color_of(p),
                    alpha: v.alpha,
                    size: render.dot_size * v.size,
                }
            })
            .collect();

        let progress = ctrl.reveal_progress(now);
        let constellation = ctrl.constellation();
        let path = constellation
            .filter(|c| !c.segments().is_empty())
            .and_then(|c| {
                c.color().map(|color| PathView {
                    points: c.reveal(field, progress),
                    color,
                    progress,
                    style: render.style,
                    fill_alpha: if render.style.fills() {
                        render.shape_alpha * progress
                    } else {
                        0.0
                    },
                    stroke_alpha: if render.style.strokes() {
                        render.connection_alpha * progress
                    } else {
                        0.0
                    },
                    stroke_width: 1.0 + 2.0 * progress,
                    section: c.section(),
                })
            });

        let width_percent = path
            .as_ref()
            .and(constellation)
            .and_then(|c| c.width_percent());
        let risk_center = constellation
            .and_then(|c| c.color())
            .map(|color| field.gradient().position_of(color));

        Self {
            width: cfg.width,
            height: cfg.height,
            gradient: field.gradient(),
            phase: ctrl.phase(),
            running: ctrl.is_running(),
            dots,
            path,
            width_percent,
            average_width: ctrl.widths().average(),
            average_x: field.average_x(),
            risk_center,
        }
    }
}

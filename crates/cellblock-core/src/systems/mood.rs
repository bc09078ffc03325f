//! Mood system - inmate agitation drift and visible suspicion

use hecs::World;
use rand::Rng;

use crate::components::{Contraband, Mood};

/// Agitation relaxes toward this when nothing is going on
const RESTING_AGITATION: f32 = 0.2;
/// Fraction of the gap to rest closed per second
const RELAX_RATE: f32 = 0.05;
/// Largest random swing per second at volatility 1.0
const DRIFT_RATE: f32 = 0.08;
/// Suspicion added per hidden item
const SUSPICION_PER_ITEM: f32 = 0.35;
/// Share of agitation that shows up as suspicion
const AGITATION_SUSPICION: f32 = 0.3;

/// Drift every inmate's agitation and recompute how suspicious they look
pub fn mood_system(world: &mut World, rng: &mut impl Rng, elapsed_seconds: f32) {
    for (_, (mood, contraband)) in world.query_mut::<(&mut Mood, Option<&Contraband>)>() {
        let swing = rng.gen_range(-1.0..=1.0) * mood.volatility * DRIFT_RATE * elapsed_seconds;
        let relax = (RESTING_AGITATION - mood.agitation) * RELAX_RATE * elapsed_seconds;
        mood.agitation = (mood.agitation + swing + relax).clamp(0.0, 1.0);
        mood.suspicion = visible_suspicion(mood, contraband.map_or(0, |c| c.items));
    }
}

/// How suspicious an inmate looks given their mood and hidden items
pub fn visible_suspicion(mood: &Mood, items: u32) -> f32 {
    (items as f32 * SUSPICION_PER_ITEM + mood.agitation * AGITATION_SUSPICION).clamp(0.0, 1.0)
}

use log::debug;

use super::{band_candidates, ExtractionContext};
use crate::{
    candidate::{Corroboration, NameCandidates, Source},
    geometry::{joined_text, Token},
};

const ITERATIONS: usize = 8;

pub(super) fn extract(ctx: &ExtractionContext) -> Option<NameCandidates> {
    let band = band_candidates(ctx);
    if band.len() < 3 || ctx.bounds.is_empty() {
        return None;
    }
    let texts = cluster_three(&band, ctx.bounds.width).map(|cluster| joined_text(&cluster));
    debug!("x-centre clusters read as {:?}", texts);
    if texts.iter().all(String::is_empty) {
        return None;
    }
    Some(NameCandidates::from_segments(
        &texts,
        Source::FallbackKmeans,
        Corroboration::None,
    ))
}

/// Three clusters of token centres, seeded at 1/6, 3/6 and 5/6 of `width`
/// and returned left to right. Ties go to the leftmost centre.
pub fn cluster_three<'a>(tokens: &[&'a Token], width: i32) -> [Vec<&'a Token>; 3] {
    let mut centers = [width / 6, width * 3 / 6, width * 5 / 6];
    let mut clusters: [Vec<&'a Token>; 3] = Default::default();
    for _ in 0..ITERATIONS {
        clusters = Default::default();
        for &token in tokens {
            let x = token.center_x();
            let nearest = (0..3)
                .min_by_key(|&k| ((x - centers[k]).abs(), k))
                .unwrap_or(0);
            clusters[nearest].push(token);
        }
        for (center, cluster) in centers.iter_mut().zip(&clusters) {
            if !cluster.is_empty() {
                *center = cluster.iter().map(|t| t.center_x()).sum::<i32>() / cluster.len() as i32;
            }
        }
    }

    let mut order = [0, 1, 2];
    order.sort_by_key(|&k| centers[k]);
    order.map(|k| std::mem::take(&mut clusters[k]))
}

use rand::Rng;
use rand::seq::IndexedRandom;
use rand::seq::index::sample;
use rsvp_core::{ConfigurationError, SequencePlan};
use tracing::debug;

/// Builds every sequence of a run up front.
///
/// Each plan is an independent draw of `seq_length` distinct image indices
/// from `0..n_images`; the same image may reappear in another sequence.
pub fn generate_plans<R: Rng + ?Sized>(
    n_images: usize,
    seq_length: usize,
    n_sequences: usize,
    isi_candidates: &[f64],
    rng: &mut R,
) -> Result<Vec<SequencePlan>, ConfigurationError> {
    if seq_length == 0 {
        return Err(ConfigurationError::invalid("seq_length", "must be at least 1"));
    }
    if n_sequences == 0 {
        return Err(ConfigurationError::invalid("n_sequences", "must be at least 1"));
    }
    if n_images < seq_length {
        return Err(ConfigurationError::InsufficientImages {
            available: n_images,
            seq_length,
        });
    }
    if isi_candidates.is_empty() {
        return Err(ConfigurationError::invalid("isi", "no candidate values"));
    }
    if let Some(bad) = isi_candidates.iter().find(|v| !(v.is_finite() && **v > 0.0)) {
        return Err(ConfigurationError::invalid(
            "isi",
            format!("{bad} is not a positive duration"),
        ));
    }

    let plans = (1..=n_sequences)
        .map(|sequence_number| {
            let image_indices = sample(rng, n_images, seq_length).into_vec();
            let isi = *isi_candidates
                .choose(rng)
                .unwrap_or(&isi_candidates[0]);
            debug!(sequence_number, isi, ?image_indices, "planned sequence");
            SequencePlan {
                sequence_number,
                image_indices,
                isi,
            }
        })
        .collect();
    Ok(plans)
}

//! # Quality Search Module
//!
//! Ricerca binaria limitata sulla qualità per rispettare una dimensione target
//! senza mai scendere sotto la qualità minima.
//!
//! ## Algoritmo:
//! 1. **Nessun target**: un solo encode alla qualità configurata
//! 2. **Tentativo "ceiling"**: encode alla qualità configurata; se rientra nel target
//!    (o la qualità è già al floor) il risultato è definitivo
//! 3. **Ricerca binaria** su `[min_quality, quality]`, al massimo `max_iterations` passi:
//!    - `mid = (low + high) / 2`
//!    - troppo grande → `high = mid`
//!    - rientra → `low = mid`, diventa il miglior candidato
//!    - stop quando un candidato che rientra dista meno di `epsilon_kb` dal target,
//!      oppure quando `high - low <= 1`
//! 4. **Risultato**: miglior candidato trovato, altrimenti encode finale a `low`
//!    (che coincide con il floor) come best-effort
//!
//! Un tentativo sopra il target non ferma mai la ricerca, anche se vicino:
//! l'intervallo `(floor, mid)` resta da esplorare.
//!
//! ## Garanzie:
//! - La qualità restituita è sempre in `[min_quality, quality]`, ristretta al range
//!   accettato dall'encoder (`Encoder::quality_range`)
//! - Deterministico per un encoder deterministico
//! - Qualsiasi errore dell'encoder interrompe la ricerca
//!
//! La funzione è pura: la usano sia lo scheduler concorrente che il driver sequenziale.

use crate::config::{SearchPolicy, Settings};
use crate::encoder::{size_kb, Encoder};
use crate::error::Result;
use image::DynamicImage;
use tracing::debug;

/// Encoded bytes plus the quality that produced them
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub bytes: Vec<u8>,
    pub quality: u8,
    /// Total encoder invocations, ceiling attempt included
    pub encode_calls: u32,
}

impl SearchResult {
    pub fn size_kb(&self) -> f64 {
        size_kb(&self.bytes)
    }
}

/// Find the highest quality whose output fits `settings.target_size_kb`.
pub fn search<E: Encoder + ?Sized>(
    encoder: &E,
    image: &DynamicImage,
    settings: &Settings,
    policy: &SearchPolicy,
) -> Result<SearchResult> {
    let range = encoder.quality_range();
    let ceiling = settings.quality.clamp(*range.start(), *range.end());
    let floor = settings.min_quality.clamp(*range.start(), ceiling);

    let bytes = encoder.encode(image, ceiling)?;
    let mut encode_calls = 1;

    let Some(target) = settings.target_size_kb else {
        return Ok(SearchResult {
            bytes,
            quality: ceiling,
            encode_calls,
        });
    };

    let ceiling_size = size_kb(&bytes);
    if ceiling_size <= target || ceiling <= floor {
        debug!(
            "Ceiling attempt accepted: q={} size={:.2} KB target={:.2} KB",
            ceiling, ceiling_size, target
        );
        return Ok(SearchResult {
            bytes,
            quality: ceiling,
            encode_calls,
        });
    }

    let mut low = floor;
    let mut high = ceiling;
    let mut best: Option<(Vec<u8>, u8)> = None;

    for iteration in 0..policy.max_iterations {
        if high - low <= 1 {
            break;
        }

        // low < high here, so mid stays inside [floor, ceiling)
        let mid = ((u16::from(low) + u16::from(high)) / 2) as u8;
        let candidate = encoder.encode(image, mid)?;
        encode_calls += 1;
        let last_size = size_kb(&candidate);

        debug!(
            "Search iteration {}: q={} size={:.2} KB (low={}, high={})",
            iteration + 1,
            mid,
            last_size,
            low,
            high
        );

        if last_size > target {
            high = mid;
        } else {
            low = mid;
            best = Some((candidate, mid));
            if target - last_size < policy.epsilon_kb {
                break;
            }
        }
    }

    if let Some((bytes, quality)) = best {
        return Ok(SearchResult {
            bytes,
            quality,
            encode_calls,
        });
    }

    // Nothing fit: `low` never moved, so this is the floor
    let bytes = encoder.encode(image, low)?;
    encode_calls += 1;
    debug!(
        "No candidate met the target, falling back to q={} ({:.2} KB)",
        low,
        size_kb(&bytes)
    );

    Ok(SearchResult {
        bytes,
        quality: low,
        encode_calls,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResizeSettings;
    use crate::encoder::JpegEncoder;
    use crate::error::ConvertError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Synthetic monotone encoder: size(q) = q * kb_per_quality KB
    struct LinearEncoder {
        bytes_per_quality: usize,
        calls: AtomicU32,
        qualities: Mutex<Vec<u8>>,
    }

    impl LinearEncoder {
        fn new(kb_per_quality: f64) -> Self {
            Self::with_bytes((kb_per_quality * 1024.0) as usize)
        }

        fn with_bytes(bytes_per_quality: usize) -> Self {
            Self {
                bytes_per_quality,
                calls: AtomicU32::new(0),
                qualities: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Encoder for LinearEncoder {
        fn encode(&self, _image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.qualities.lock().unwrap().push(quality);
            Ok(vec![0u8; quality as usize * self.bytes_per_quality])
        }

        fn extension(&self) -> &'static str {
            "bin"
        }
    }

    /// Fails on any quality below the threshold
    struct FailingEncoder {
        fail_below: u8,
    }

    impl Encoder for FailingEncoder {
        fn encode(&self, _image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
            if quality < self.fail_below {
                return Err(ConvertError::Encode(format!("codec refused q={}", quality)));
            }
            Ok(vec![0u8; 100 * 1024])
        }

        fn extension(&self) -> &'static str {
            "bin"
        }
    }

    fn image() -> DynamicImage {
        DynamicImage::new_rgb8(1, 1)
    }

    fn run<E: Encoder>(encoder: &E, settings: Settings) -> SearchResult {
        search(encoder, &image(), &settings, &SearchPolicy::default()).unwrap()
    }

    fn settings(quality: u8, min_quality: u8, target: Option<f64>) -> Settings {
        Settings {
            quality,
            min_quality,
            target_size_kb: target,
            resize: ResizeSettings::default(),
        }
    }

    #[test]
    fn test_no_target_encodes_once() {
        for quality in [0u8, 35, 80, 100] {
            let encoder = LinearEncoder::new(1.0);
            let result = run(&encoder, settings(quality, 0, None));

            assert_eq!(result.quality, quality);
            assert_eq!(result.encode_calls, 1);
            assert_eq!(encoder.calls(), 1);
        }
    }

    #[test]
    fn test_ceiling_already_fits() {
        let encoder = LinearEncoder::new(0.5);
        // size(80) = 40 KB <= 50 KB
        let result = run(&encoder, settings(80, 10, Some(50.0)));

        assert_eq!(result.quality, 80);
        assert_eq!(encoder.calls(), 1);
    }

    #[test]
    fn test_quality_at_floor_skips_search() {
        let encoder = LinearEncoder::new(1.0);
        let result = run(&encoder, settings(60, 60, Some(1.0)));

        assert_eq!(result.quality, 60);
        assert_eq!(encoder.calls(), 1);
    }

    #[test]
    fn test_floor_cannot_meet_target() {
        let encoder = LinearEncoder::new(1.0);
        // size(40) = 40 KB > 5 KB: best effort at the floor
        let result = run(&encoder, settings(80, 40, Some(5.0)));

        assert_eq!(result.quality, 40);
        assert!(encoder.qualities.lock().unwrap().iter().all(|q| *q >= 40));
    }

    #[test]
    fn test_converges_to_exact_floor_match() {
        // size(q) = q/2 KB, size(40) = 20 KB exactly
        let encoder = LinearEncoder::new(0.5);
        let policy = SearchPolicy::default();
        let result = search(&encoder, &image(), &settings(80, 40, Some(20.0)), &policy).unwrap();

        assert_eq!(result.quality, 40);
        assert!(result.size_kb() <= 20.0);
        assert!(result.encode_calls <= policy.max_iterations + 2);
    }

    #[test]
    fn test_monotone_search_stays_within_cap_and_target() {
        let policy = SearchPolicy {
            max_iterations: 7,
            epsilon_kb: 1.0,
        };

        for target in [12.0, 17.5, 23.0, 29.9] {
            let encoder = LinearEncoder::new(0.5);
            let result =
                search(&encoder, &image(), &settings(90, 10, Some(target)), &policy).unwrap();

            assert!(result.quality >= 10 && result.quality <= 90);
            assert!(result.size_kb() <= target, "target {}: {} KB", target, result.size_kb());
            assert!(encoder.calls() <= policy.max_iterations + 2);

            // The tightest bound found: highest attempted quality that fit
            let tightest = encoder
                .qualities
                .lock()
                .unwrap()
                .iter()
                .copied()
                .filter(|q| *q as f64 * 0.5 <= target)
                .max();
            assert_eq!(tightest, Some(result.quality), "target {}", target);
        }
    }

    #[test]
    fn test_iteration_cap_is_respected() {
        let policy = SearchPolicy {
            max_iterations: 2,
            epsilon_kb: 0.0,
        };
        let encoder = LinearEncoder::new(1.0);
        let result = search(&encoder, &image(), &settings(100, 0, Some(3.0)), &policy).unwrap();

        // ceiling + 2 iterations + floor fallback at most
        assert!(encoder.calls() <= 4);
        assert!(result.quality <= 100);
    }

    #[test]
    fn test_search_is_deterministic() {
        let attempt = || {
            let encoder = LinearEncoder::new(0.37);
            let result = run(&encoder, settings(95, 20, Some(21.0)));
            let qualities = encoder.qualities.lock().unwrap().clone();
            (result.quality, qualities)
        };

        assert_eq!(attempt(), attempt());
    }

    #[test]
    fn test_encoder_failure_aborts_search() {
        let encoder = FailingEncoder { fail_below: 70 };
        let policy = SearchPolicy::default();
        let result = search(&encoder, &image(), &settings(80, 40, Some(10.0)), &policy);

        assert!(matches!(result, Err(ConvertError::Encode(_))));
    }

    #[test]
    fn test_floor_above_quality_is_clamped() {
        let encoder = LinearEncoder::new(1.0);
        let result = run(&encoder, settings(50, 90, Some(1.0)));

        assert_eq!(result.quality, 50);
        assert_eq!(encoder.calls(), 1);
    }

    #[test]
    fn test_near_miss_above_target_keeps_searching() {
        // size(q) = 461 q bytes: q=45 lands 0.26 KB over a 20 KB target, q=44 fits
        let encoder = LinearEncoder::with_bytes(461);
        let result = run(&encoder, settings(80, 10, Some(20.0)));

        assert!(result.size_kb() <= 20.0);
        assert!(result.quality > 10, "fell back to the floor");
        assert!(result.quality >= 40, "q={} is far from the best fit", result.quality);
        assert_eq!(result.encode_calls, encoder.calls());
        assert!(encoder.qualities.lock().unwrap().contains(&45));
    }

    #[test]
    fn test_fitting_candidate_within_epsilon_stops_early() {
        let policy = SearchPolicy {
            max_iterations: 10,
            epsilon_kb: 6.0,
        };
        // size(q) = q KB, target 50: ceiling 80 over, mid 45 fits 5 KB short
        let encoder = LinearEncoder::new(1.0);
        let result = search(&encoder, &image(), &settings(80, 10, Some(50.0)), &policy).unwrap();

        assert_eq!(result.quality, 45);
        assert_eq!(encoder.calls(), 2);
    }

    #[test]
    fn test_cap_exhausted_without_fit_uses_floor() {
        let policy = SearchPolicy {
            max_iterations: 1,
            epsilon_kb: 0.0,
        };
        // size(q) = q KB, target 30: the only probe (q=55) is over target
        let encoder = LinearEncoder::new(1.0);
        let result = search(&encoder, &image(), &settings(100, 10, Some(30.0)), &policy).unwrap();

        assert_eq!(result.quality, 10);
        assert!(result.size_kb() <= 30.0);
        assert_eq!(*encoder.qualities.lock().unwrap(), vec![100, 55, 10]);
        assert_eq!(result.encode_calls, 3);
    }

    #[test]
    fn test_reported_quality_is_what_the_codec_used() {
        let result = search(
            &JpegEncoder,
            &DynamicImage::new_rgb8(8, 8),
            &settings(0, 0, None),
            &SearchPolicy::default(),
        )
        .unwrap();

        assert_eq!(result.quality, 1);
    }
}

//! Parallel sample loading.
//!
//! Exposed through
//! [`SequenceDataset::samples_parallel`](crate::SequenceDataset::samples_parallel).
//! Every worker builds its sample from scratch: its own decoder, its own
//! scratch directory. Nothing mutable is shared apart from the progress
//! callback, which is `Sync`.

use ::rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::{
    dataset::{Sample, SequenceDataset},
    error::FrameBatchError,
    processor::ImageProcessor,
};

/// Load every sample of `dataset` on the global rayon pool, in index order.
pub(crate) fn load_samples<P: ImageProcessor>(
    dataset: &SequenceDataset<P>,
) -> Result<Vec<Sample>, FrameBatchError> {
    log::debug!(
        "Loading {} samples on {} rayon threads",
        dataset.len(),
        ::rayon::current_num_threads(),
    );

    (0..dataset.len())
        .into_par_iter()
        .map(|index| {
            if dataset.options().is_cancelled() {
                return Err(FrameBatchError::Cancelled);
            }
            dataset.get(index)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::fs;

    use crate::npy::tests::npy_bytes;
    use crate::{DatasetOptions, SequenceDataset};

    #[test]
    fn parallel_matches_sequential() {
        let root = tempfile::tempdir().unwrap();
        for (index, value) in [0u8, 80, 160].into_iter().enumerate() {
            fs::write(
                root.path().join(format!("frame_{index}.npy")),
                npy_bytes("|u1", false, &[4, 4], &[value; 16]),
            )
            .unwrap();
        }

        let dataset =
            SequenceDataset::open_with_options(root.path(), DatasetOptions::new()).unwrap();
        let parallel = dataset.samples_parallel().unwrap();
        let sequential = dataset.get(0).unwrap();

        assert_eq!(parallel.len(), 1);
        assert_eq!(parallel[0].batch, sequential.batch);
        assert_eq!(parallel[0].scene_name, sequential.scene_name);
    }
}

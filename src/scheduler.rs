//! Worker-pool offload for edits and views
//!
//! Proof generation and verification are CPU-bound, so async callers hand
//! them to tokio's blocking pool. Every call owns its inputs: a `Photograph`
//! is a value and keys are shared by `Arc`, so no locking is involved.
//!
//! Ordering
//! - Calls for **different** chains may run concurrently and complete in any
//!   order.
//! - Calls within **one** chain are sequential by construction: the next
//!   edit needs the photograph the previous one returns.
//! - A failed or aborted edit never produces a photograph; the caller keeps
//!   the previous one.

#![forbid(unsafe_code)]

use tokio::task::{self, JoinError};
use tracing::debug;

use crate::identity::Identity;
use crate::photograph::Photograph;
use crate::prover::{EditError, Prover};
use crate::transformation::{Transformation, TransformationParameters};
use crate::verifier::{Verdict, Verifier, ViewError};

/// Run [`Prover::edit`] on the blocking pool.
pub async fn edit(
    prover: Prover,
    photograph: Photograph,
    transformation: Transformation,
    parameters: TransformationParameters,
    signer: Identity,
) -> Result<Photograph, EditError> {
    debug!(transformation = %transformation, "offloading edit");
    task::spawn_blocking(move || prover.edit(&photograph, transformation, &parameters, &signer))
        .await
        .map_err(|e| EditError::Worker(join_reason(e)))?
}

/// Run [`Verifier::view`] on the blocking pool.
pub async fn view(verifier: Verifier, photograph: Photograph) -> Result<Verdict, ViewError> {
    task::spawn_blocking(move || verifier.view(&photograph))
        .await
        .map_err(|e| ViewError::Worker(join_reason(e)))?
}

/// View many independent photographs concurrently; results keep input order.
pub async fn view_all(verifier: Verifier, photographs: Vec<Photograph>) -> Vec<Result<Verdict, ViewError>> {
    debug!(count = photographs.len(), "offloading views");
    let handles: Vec<_> = photographs
        .into_iter()
        .map(|p| {
            let verifier = verifier.clone();
            task::spawn_blocking(move || verifier.view(&p))
        })
        .collect();

    let mut out = Vec::with_capacity(handles.len());
    for h in handles {
        out.push(h.await.map_err(|e| ViewError::Worker(join_reason(e))).and_then(|r| r));
    }
    out
}

fn join_reason(e: JoinError) -> String {
    if e.is_panic() {
        "worker panicked".to_string()
    } else {
        e.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::Image;
    use crate::keys;
    use crate::photograph::Proof;
    use crate::record::ProvenanceRecord;
    use rand::{rngs::StdRng, SeedableRng};

    fn trusted() -> Verifier {
        Verifier::new(keys::global_or_generate().unwrap().verifying)
    }

    fn genesis(seed: u64) -> (Identity, Photograph) {
        let keys = keys::global_or_generate().unwrap();
        let id = Identity::generate_with(&mut StdRng::seed_from_u64(seed));
        let img = Image::random(&mut StdRng::seed_from_u64(seed + 1));
        let (_, sig) = id.sign_image(&img);
        let record = ProvenanceRecord::genesis(img, id.public_key(), sig);
        (id, Photograph::new(record, Proof { pcd_proof: None, signature: sig }, &keys))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn independent_chains_advance_concurrently() {
        let (a_id, a0) = genesis(71);
        let (b_id, b0) = genesis(73);
        let params = TransformationParameters::Identity;

        let (a1, b1) = tokio::join!(
            edit(Prover::new(), a0.clone(), Transformation::Identity, params.clone(), a_id),
            edit(Prover::new(), b0.clone(), Transformation::Identity, params.clone(), b_id),
        );
        let (a1, b1) = (a1.unwrap(), b1.unwrap());
        assert_eq!(a1.record, a0.record);
        assert_eq!(b1.record, b0.record);

        let verdicts = view_all(trusted(), vec![a1, b1, a0]).await;
        assert_eq!(verdicts.len(), 3);
        assert!(verdicts.into_iter().all(|v| v.unwrap().is_valid()));
    }

    #[tokio::test]
    async fn failed_edit_leaves_caller_with_previous_state() {
        let (owner, p0) = genesis(75);
        let (thief, _) = genesis(77);
        let p1 = edit(Prover::new(), p0, Transformation::Identity, TransformationParameters::Identity, owner)
            .await
            .unwrap();
        let err = edit(Prover::new(), p1.clone(), Transformation::Identity, TransformationParameters::Identity, thief)
            .await
            .unwrap_err();
        assert!(matches!(err, EditError::Signing(_)));
        assert!(view(trusted(), p1).await.unwrap().is_valid());
    }
}

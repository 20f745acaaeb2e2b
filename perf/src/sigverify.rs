//! Checking transaction signatures against account permissions, one batch
//! at a time on a dedicated thread pool.

use {
    crossbeam_channel::unbounded,
    log::*,
    rayon::{ThreadPool, ThreadPoolBuilder},
    std::sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    strata_sdk::{
        account::Permission,
        pubkey::Pubkey,
        transaction::{Transaction, TransactionId},
    },
    thiserror::Error,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SigVerifyError {
    #[error("transaction {0} carries no signature")]
    MissingSignature(TransactionId),

    #[error("transaction {id} carries {count} signatures for {keys} permission keys")]
    TooManySignatures {
        id: TransactionId,
        count: usize,
        keys: usize,
    },

    #[error("transaction {id}: signature {index} matches no permission key")]
    UnknownSigner { id: TransactionId, index: usize },

    #[error("transaction {id}: key {signer} signed more than once")]
    DuplicateSigner { id: TransactionId, signer: Pubkey },

    #[error("transaction {id}: signature weight {weight} below threshold {threshold}")]
    InsufficientWeight {
        id: TransactionId,
        weight: u64,
        threshold: u64,
    },

    #[error("signature verification interrupted")]
    Interrupted,
}

pub trait SignatureEngine: Send + Sync {
    /// Checks that the signatures of `transaction` satisfy `permission`.
    fn verify(
        &self,
        transaction: &Transaction,
        permission: &Permission,
    ) -> Result<(), SigVerifyError>;
}

/// Weighted multi-signature check over ed25519 signatures of the
/// transaction id. Each permission key may contribute its weight once.
#[derive(Debug, Default)]
pub struct Ed25519SignatureEngine;

impl SignatureEngine for Ed25519SignatureEngine {
    fn verify(
        &self,
        transaction: &Transaction,
        permission: &Permission,
    ) -> Result<(), SigVerifyError> {
        let id = transaction.id();
        if transaction.signatures.is_empty() {
            return Err(SigVerifyError::MissingSignature(id));
        }
        if transaction.signatures.len() > permission.keys.len() {
            return Err(SigVerifyError::TooManySignatures {
                id,
                count: transaction.signatures.len(),
                keys: permission.keys.len(),
            });
        }

        let mut signers: Vec<Pubkey> = Vec::with_capacity(transaction.signatures.len());
        let mut weight = 0u64;
        for (index, signature) in transaction.signatures.iter().enumerate() {
            let key = permission
                .keys
                .iter()
                .find(|key| signature.verify(key.address.as_ref(), id.as_ref()))
                .ok_or(SigVerifyError::UnknownSigner { id, index })?;
            if signers.contains(&key.address) {
                return Err(SigVerifyError::DuplicateSigner {
                    id,
                    signer: key.address,
                });
            }
            signers.push(key.address);
            weight = weight.saturating_add(key.weight);
        }

        if weight < permission.threshold {
            return Err(SigVerifyError::InsufficientWeight {
                id,
                weight,
                threshold: permission.threshold,
            });
        }
        Ok(())
    }
}

/// One transaction and the permission its owner account currently holds.
pub struct VerifyRequest<'a> {
    pub transaction: &'a Transaction,
    pub permission: Permission,
}

pub struct ParallelSignatureVerifier {
    thread_pool: ThreadPool,
    engine: Arc<dyn SignatureEngine>,
    exit: Arc<AtomicBool>,
}

impl ParallelSignatureVerifier {
    pub fn new(num_threads: usize, engine: Arc<dyn SignatureEngine>, exit: Arc<AtomicBool>) -> Self {
        let num_threads = if num_threads == 0 {
            num_cpus::get()
        } else {
            num_threads
        };
        let thread_pool = ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("strSigVerify{i:02}"))
            .build()
            .expect("new rayon threadpool");
        Self {
            thread_pool,
            engine,
            exit,
        }
    }

    pub fn num_threads(&self) -> usize {
        self.thread_pool.current_num_threads()
    }

    /// Verifies every request of the batch. Results are consumed in
    /// completion order and the first failure fails the whole batch. On
    /// success every transaction is marked verified; transactions already
    /// marked are not checked again.
    pub fn verify_batch(&self, requests: &[VerifyRequest]) -> Result<(), SigVerifyError> {
        if self.exit.load(Ordering::Relaxed) {
            return Err(SigVerifyError::Interrupted);
        }

        let (sender, receiver) = unbounded();
        let engine = &self.engine;
        let exit = &self.exit;
        self.thread_pool.scope(|scope| {
            for request in requests {
                let sender = sender.clone();
                scope.spawn(move |_| {
                    let result = if exit.load(Ordering::Relaxed) {
                        Err(SigVerifyError::Interrupted)
                    } else if request.transaction.is_verified() {
                        Ok(())
                    } else {
                        engine.verify(request.transaction, &request.permission)
                    };
                    // the receiver outlives the scope
                    let _ = sender.send(result);
                });
            }
        });
        drop(sender);

        for result in receiver.iter() {
            if let Err(err) = result {
                debug!("signature batch of {} rejected: {}", requests.len(), err);
                return Err(err);
            }
        }
        if self.exit.load(Ordering::Relaxed) {
            return Err(SigVerifyError::Interrupted);
        }

        for request in requests {
            request.transaction.set_verified(true);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        assert_matches::assert_matches,
        strata_sdk::{
            account::PermissionKey,
            hash::Hash,
            signature::{Keypair, Signer},
            transaction::{Contract, ContractType, RawTransaction},
        },
        test_case::test_case,
    };

    fn raw(owner: &Pubkey) -> RawTransaction {
        RawTransaction {
            ref_block_number: 1,
            ref_block_hash: Hash::new_unique(),
            expiration: 10_000,
            timestamp: 1,
            fee_limit: 0,
            contracts: vec![Contract {
                kind: ContractType::Transfer,
                owner: *owner,
                parameter: vec![],
            }],
        }
    }

    fn multisig(keys: &[&Keypair], weights: &[u64], threshold: u64) -> Permission {
        Permission {
            threshold,
            keys: keys
                .iter()
                .zip(weights)
                .map(|(key, weight)| PermissionKey {
                    address: key.pubkey(),
                    weight: *weight,
                })
                .collect(),
        }
    }

    #[test]
    fn test_single_key() {
        let owner = Keypair::new();
        let transaction = Transaction::new(raw(&owner.pubkey()), &[&owner]);
        let permission = Permission::single(owner.pubkey());
        assert_eq!(Ed25519SignatureEngine.verify(&transaction, &permission), Ok(()));

        let unsigned = Transaction::new_unsigned(raw(&owner.pubkey()));
        assert_matches!(
            Ed25519SignatureEngine.verify(&unsigned, &permission),
            Err(SigVerifyError::MissingSignature(_))
        );

        let stranger = Keypair::new();
        let forged = Transaction::new(raw(&owner.pubkey()), &[&stranger]);
        assert_matches!(
            Ed25519SignatureEngine.verify(&forged, &permission),
            Err(SigVerifyError::UnknownSigner { index: 0, .. })
        );
    }

    #[test_case(&[0], false; "one of two below threshold")]
    #[test_case(&[0, 1], true; "both reach threshold")]
    #[test_case(&[2], true; "heavy key alone")]
    fn test_weighted_threshold(signer_indexes: &[usize], ok: bool) {
        let keys = [Keypair::new(), Keypair::new(), Keypair::new()];
        let permission = multisig(&[&keys[0], &keys[1], &keys[2]], &[1, 1, 2], 2);
        let signers: Vec<&Keypair> = signer_indexes.iter().map(|i| &keys[*i]).collect();
        let transaction = Transaction::new(raw(&keys[0].pubkey()), &signers);
        let result = Ed25519SignatureEngine.verify(&transaction, &permission);
        if ok {
            assert_eq!(result, Ok(()));
        } else {
            assert_matches!(
                result,
                Err(SigVerifyError::InsufficientWeight {
                    weight: 1,
                    threshold: 2,
                    ..
                })
            );
        }
    }

    #[test]
    fn test_duplicate_signer_counts_once() {
        let keys = [Keypair::new(), Keypair::new()];
        let permission = multisig(&[&keys[0], &keys[1]], &[1, 1], 2);
        let transaction = Transaction::new(raw(&keys[0].pubkey()), &[&keys[0], &keys[0]]);
        assert_matches!(
            Ed25519SignatureEngine.verify(&transaction, &permission),
            Err(SigVerifyError::DuplicateSigner { .. })
        );
    }

    #[test]
    fn test_too_many_signatures() {
        let owner = Keypair::new();
        let transaction = Transaction::new(raw(&owner.pubkey()), &[&owner, &Keypair::new()]);
        assert_matches!(
            Ed25519SignatureEngine.verify(&transaction, &Permission::single(owner.pubkey())),
            Err(SigVerifyError::TooManySignatures { count: 2, keys: 1, .. })
        );
    }

    fn verifier(exit: Arc<AtomicBool>) -> ParallelSignatureVerifier {
        ParallelSignatureVerifier::new(4, Arc::new(Ed25519SignatureEngine), exit)
    }

    fn signed_batch(n: usize) -> Vec<(Transaction, Permission)> {
        (0..n)
            .map(|_| {
                let owner = Keypair::new();
                (
                    Transaction::new(raw(&owner.pubkey()), &[&owner]),
                    Permission::single(owner.pubkey()),
                )
            })
            .collect()
    }

    fn requests(batch: &[(Transaction, Permission)]) -> Vec<VerifyRequest> {
        batch
            .iter()
            .map(|(transaction, permission)| VerifyRequest {
                transaction,
                permission: permission.clone(),
            })
            .collect()
    }

    #[test]
    fn test_batch_marks_verified() {
        let verifier = verifier(Arc::new(AtomicBool::new(false)));
        assert_eq!(verifier.num_threads(), 4);
        let batch = signed_batch(16);
        verifier.verify_batch(&requests(&batch)).unwrap();
        assert!(batch.iter().all(|(transaction, _)| transaction.is_verified()));
    }

    #[test]
    fn test_one_bad_signature_fails_batch() {
        let verifier = verifier(Arc::new(AtomicBool::new(false)));
        let mut batch = signed_batch(16);
        batch[7].1 = Permission::single(Keypair::new().pubkey());
        assert_matches!(
            verifier.verify_batch(&requests(&batch)),
            Err(SigVerifyError::UnknownSigner { .. })
        );
        assert!(batch.iter().all(|(transaction, _)| !transaction.is_verified()));
    }

    #[test]
    fn test_verified_transactions_are_skipped() {
        let verifier = verifier(Arc::new(AtomicBool::new(false)));
        let mut batch = signed_batch(2);
        batch[0].1 = Permission::single(Keypair::new().pubkey());
        batch[0].0.set_verified(true);
        verifier.verify_batch(&requests(&batch)).unwrap();
    }

    #[test]
    fn test_exit_interrupts() {
        let exit = Arc::new(AtomicBool::new(false));
        let verifier = verifier(exit.clone());
        let batch = signed_batch(4);
        exit.store(true, Ordering::Relaxed);
        assert_eq!(
            verifier.verify_batch(&requests(&batch)),
            Err(SigVerifyError::Interrupted)
        );
        assert!(!batch[0].0.is_verified());
    }

    #[test]
    fn test_empty_batch() {
        let verifier = verifier(Arc::new(AtomicBool::new(false)));
        assert_eq!(verifier.verify_batch(&[]), Ok(()));
    }
}

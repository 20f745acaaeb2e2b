pub mod sigverify;

pub use sigverify::{
    Ed25519SignatureEngine, ParallelSignatureVerifier, SigVerifyError, SignatureEngine,
    VerifyRequest,
};

//! Contract bindings.
//!
//! Each binding lives in its own module because two of the ABIs share the
//! `getAddress` name and abigen emits call types per function name.

pub mod email_factory {
    use ethers::prelude::abigen;

    abigen!(
        EmailAaFactory,
        r#"[
            function createAccount(address owner, uint8 kind, address binanceWallet, bytes32 emailCommitment, address verifier, uint256 salt) external returns (address)
            function getAddress(address owner, uint8 kind, address binanceWallet, bytes32 emailCommitment, address verifier, uint256 salt) external view returns (address)
        ]"#
    );
}

pub mod email_verifier {
    use ethers::prelude::abigen;

    abigen!(
        ZkEmailVerifier,
        r#"[
            function verifyProof(bytes proof, bytes32 emailCommitment, bytes32 nullifier, bytes32 userOpHash) external view returns (bool)
        ]"#
    );
}

pub mod account_factory {
    use ethers::prelude::abigen;

    abigen!(
        SimpleAccountFactory,
        r#"[
            function getAddress(address owner, uint256 salt) external view returns (address)
        ]"#
    );
}

pub use account_factory::SimpleAccountFactory;
pub use email_factory::EmailAaFactory;
pub use email_verifier::ZkEmailVerifier;

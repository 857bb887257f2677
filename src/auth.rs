//! Signature Authentication
//!
//! Requests are authorized by an EIP-191 `personal_sign` signature over a
//! fixed message. The signer may be the player's wallet itself or a
//! delegate (session) key the wallet registered on-chain.
//! The coordinator never issues keys - it only checks them.

use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use tracing::debug;

use crate::chain::GameChain;
use crate::core::address::{Address, RoomId};
use crate::core::hash::{keccak256, personal_message_hash};
use crate::error::CoordError;

/// Who produced a valid signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignerRole {
    /// The player's own wallet.
    Primary,
    /// A registered, unexpired session key.
    Delegate,
}

/// Checks `(address, message, signature)` triples.
pub trait SignatureVerifier: Send + Sync + 'static {
    /// True if `signature` over `message` was produced by `address`.
    fn verify(&self, address: Address, message: &str, signature: &str) -> bool;
}

/// Ethereum `personal_sign` verifier (secp256k1 public-key recovery).
#[derive(Debug, Clone, Copy, Default)]
pub struct Eip191Verifier;

impl Eip191Verifier {
    /// Recover the signing address of a 65-byte `r || s || v` hex signature.
    pub fn recover(message: &str, signature: &str) -> Option<Address> {
        let bytes = hex::decode(signature.trim().trim_start_matches("0x")).ok()?;
        if bytes.len() != 65 {
            return None;
        }
        let sig = Signature::from_slice(&bytes[..64]).ok()?;
        let v = bytes[64];
        let recovery_id = RecoveryId::from_byte(if v >= 27 { v - 27 } else { v })?;

        let digest = personal_message_hash(message);
        let key = VerifyingKey::recover_from_prehash(&digest, &sig, recovery_id).ok()?;
        Some(address_of(&key))
    }
}

impl SignatureVerifier for Eip191Verifier {
    fn verify(&self, address: Address, message: &str, signature: &str) -> bool {
        Self::recover(message, signature) == Some(address)
    }
}

/// Ethereum address of a public key.
pub fn address_of(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&hash[12..]);
    Address::new(bytes)
}

/// Message a player signs to reveal their role secret.
pub fn reveal_secret_message(room_id: RoomId, role: u8, salt: &str) -> String {
    format!("reveal-secret:{}:{}:{}", room_id, role, salt)
}

/// Message a detective signs to request an investigation result.
pub fn investigate_message(room_id: RoomId, target: Address) -> String {
    format!("investigate:{}:{}", room_id, target)
}

/// Authenticate `player` via their own signature or a registered delegate.
///
/// The delegate path needs a supplied delegate address whose signature
/// matches and which the contract lists as the player's unexpired key.
pub async fn authenticate<C: GameChain>(
    verifier: &dyn SignatureVerifier,
    chain: &C,
    now_secs: u64,
    player: Address,
    delegate: Option<Address>,
    message: &str,
    signature: &str,
) -> Result<SignerRole, CoordError> {
    if verifier.verify(player, message, signature) {
        return Ok(SignerRole::Primary);
    }

    let Some(delegate) = delegate else {
        return Err(CoordError::Authentication("signature does not match player".to_string()));
    };
    if !verifier.verify(delegate, message, signature) {
        return Err(CoordError::Authentication(
            "signature matches neither player nor delegate".to_string(),
        ));
    }

    match chain.delegate_of(player).await? {
        Some(registered) if registered.key == delegate && registered.expires_at > now_secs => {
            debug!("Accepted delegate {} for {}", delegate, player);
            Ok(SignerRole::Delegate)
        }
        Some(registered) if registered.key == delegate => {
            Err(CoordError::Authentication("delegate key expired".to_string()))
        }
        _ => Err(CoordError::Authentication(
            "delegate is not registered for this player".to_string(),
        )),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::RoomPhase;
    use crate::testing::{sign, MockChain, TestWallet};

    #[test]
    fn test_recover_roundtrip() {
        let wallet = TestWallet::random();
        let message = reveal_secret_message(12, 3, "abc");
        let signature = sign(&wallet, &message);

        assert_eq!(Eip191Verifier::recover(&message, &signature), Some(wallet.address));
        assert!(Eip191Verifier.verify(wallet.address, &message, &signature));
    }

    #[test]
    fn test_wrong_message_or_signer_fails() {
        let wallet = TestWallet::random();
        let other = TestWallet::random();
        let signature = sign(&wallet, "reveal-secret:1:1:a");

        assert!(!Eip191Verifier.verify(wallet.address, "reveal-secret:1:1:b", &signature));
        assert!(!Eip191Verifier.verify(other.address, "reveal-secret:1:1:a", &signature));
    }

    #[test]
    fn test_malformed_signatures() {
        assert_eq!(Eip191Verifier::recover("m", "0x1234"), None);
        assert_eq!(Eip191Verifier::recover("m", "not hex"), None);
        assert_eq!(Eip191Verifier::recover("m", &format!("0x{}", "00".repeat(65))), None);
    }

    #[test]
    fn test_message_formats() {
        assert_eq!(reveal_secret_message(4, 1, "xyz"), "reveal-secret:4:1:xyz");
        let target: Address = "0xABCDEF0123456789ABCDEF0123456789ABCDEF01".parse().unwrap();
        assert_eq!(
            investigate_message(4, target),
            "investigate:4:0xabcdef0123456789abcdef0123456789abcdef01"
        );
    }

    #[tokio::test]
    async fn test_authenticate_primary_and_delegate() {
        let player = TestWallet::random();
        let session = TestWallet::random();
        let chain = MockChain::new();
        chain.add_room(1, player.address, RoomPhase::Reveal, &[player.address]).await;
        chain.register_delegate(player.address, session.address, 2_000).await;

        let msg = "investigate:1:0x0000000000000000000000000000000000000001";

        let role = authenticate(&Eip191Verifier, &chain, 1_000, player.address, None, msg, &sign(&player, msg))
            .await
            .unwrap();
        assert_eq!(role, SignerRole::Primary);

        let by_session = sign(&session, msg);
        let role = authenticate(&Eip191Verifier, &chain, 1_000, player.address, Some(session.address), msg, &by_session)
            .await
            .unwrap();
        assert_eq!(role, SignerRole::Delegate);

        // Same delegate, but expired
        let expired = authenticate(&Eip191Verifier, &chain, 2_000, player.address, Some(session.address), msg, &by_session).await;
        assert!(matches!(expired, Err(CoordError::Authentication(_))));

        // Delegate signature without naming the delegate
        let unnamed = authenticate(&Eip191Verifier, &chain, 1_000, player.address, None, msg, &by_session).await;
        assert!(matches!(unnamed, Err(CoordError::Authentication(_))));
    }

    #[tokio::test]
    async fn test_unregistered_delegate_rejected() {
        let player = TestWallet::random();
        let stranger = TestWallet::random();
        let chain = MockChain::new();

        let msg = "reveal-secret:1:4:salt";
        let result = authenticate(
            &Eip191Verifier,
            &chain,
            0,
            player.address,
            Some(stranger.address),
            msg,
            &sign(&stranger, msg),
        )
        .await;
        assert!(matches!(result, Err(CoordError::Authentication(_))));
    }
}

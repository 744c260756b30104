// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Feature-bit validation for incoming gossip.
//!
//! Even bits are compulsory: a peer setting an even bit we do not know about
//! is telling us we cannot use the message. Odd bits are optional and may be
//! ignored.

use crate::error::RouterError;

/// The feature bits this wallet understands, as (compulsory, optional)
/// pairs: option_data_loss_protect (0/1), initial_routing_sync (3),
/// option_upfront_shutdown_script (4/5) and var_onion_optin (8/9).
pub const KNOWN_FEATURE_BITS: u64 =
	(1 << 0) | (1 << 1) | (1 << 3) | (1 << 4) | (1 << 5) | (1 << 8) | (1 << 9);

/// Rejects feature bitfields carrying unknown even bits.
pub fn validate_features(features: u64) -> Result<(), RouterError> {
	for bit in (0..64).step_by(2) {
		if features & (1 << bit) != 0 && KNOWN_FEATURE_BITS & (1 << bit) == 0 {
			return Err(RouterError::UnknownEvenFeatureBits);
		}
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn known_features_pass() {
		assert!(validate_features(0).is_ok());
		assert!(validate_features(KNOWN_FEATURE_BITS).is_ok());
		assert!(validate_features(1 << 0).is_ok());
		assert!(validate_features((1 << 4) | (1 << 8)).is_ok());
	}

	#[test]
	fn unknown_odd_bits_are_ignored() {
		assert!(validate_features(1 << 11).is_ok());
		assert!(validate_features(1 << 63).is_ok());
	}

	#[test]
	fn unknown_even_bits_are_rejected() {
		assert!(matches!(validate_features(1 << 6), Err(RouterError::UnknownEvenFeatureBits)));
		assert!(matches!(validate_features(1 << 10), Err(RouterError::UnknownEvenFeatureBits)));
		assert!(matches!(
			validate_features(KNOWN_FEATURE_BITS | (1 << 62)),
			Err(RouterError::UnknownEvenFeatureBits)
		));
	}
}

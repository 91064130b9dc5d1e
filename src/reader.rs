//! The reader boundary: transmits a batch of APDUs to a physical or emulated
//! card reader. Purely an interface in this crate (spec §4.6) — the host
//! application supplies the transport.

// Uses
use crate::apdu::{ApduRequest, ApduResponse};

/// An ordered batch of requests to transmit to one reader, with a flag
/// controlling whether transmission stops at the first status word the
/// caller didn't mark as acceptable.
#[derive(Clone, Debug, Default)]
pub struct CardRequest {
	pub apdu_requests: Vec<ApduRequest>,
	pub stop_on_unsuccessful_status_word: bool,
}

impl CardRequest {
	pub fn new(apdu_requests: Vec<ApduRequest>, stop_on_unsuccessful_status_word: bool) -> Self {
		Self { apdu_requests, stop_on_unsuccessful_status_word }
	}
}

/// The ordered responses to a [`CardRequest`]; shorter than the request when
/// `stop_on_unsuccessful_status_word` truncated the exchange at a disallowed
/// status word.
#[derive(Clone, Debug, Default)]
pub struct CardResponse {
	pub apdu_responses: Vec<ApduResponse>,
}

/// The transport boundary a host application implements to actually talk to
/// a card reader (physical, emulated, or a test double).
///
/// This crate never implements this trait itself; it only calls through it.
pub trait CardTransceiver {
	type Error: std::error::Error + Send + Sync + 'static;

	fn transmit(&mut self, request: CardRequest) -> Result<CardResponse, Self::Error>;
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::apdu::ApduRequest;

	struct EchoTransceiver;

	impl CardTransceiver for EchoTransceiver {
		type Error = std::convert::Infallible;

		fn transmit(&mut self, request: CardRequest) -> Result<CardResponse, Self::Error> {
			let apdu_responses = request
				.apdu_requests
				.iter()
				.map(|_| ApduResponse { data_out: vec![], status_word: 0x9000 })
				.collect();
			Ok(CardResponse { apdu_responses })
		}
	}

	#[test]
	fn transceiver_returns_one_response_per_request() {
		let mut transceiver = EchoTransceiver;
		let request = CardRequest::new(vec![ApduRequest::new(vec![0x00]), ApduRequest::new(vec![0x00])], true);
		let response = transceiver.transmit(request).unwrap();
		assert_eq!(response.apdu_responses.len(), 2);
	}
}

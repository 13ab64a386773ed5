//! Validated signal messages
//!
//! [`SignalPayload`] is whatever arrived on the wire; [`SignalMessage`] is what
//! the link acts on after filling in defaults and rejecting malformed input.

use crate::protocol::{CandidatePayload, SessionDescription, SignalPayload};

use super::error::NegotiationError;

/// One connectivity option for the direct transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IceCandidate {
    pub candidate: String,
    pub sdp_mid: Option<String>,
    pub sdp_m_line_index: u16,
    pub username_fragment: Option<String>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: None,
            sdp_m_line_index: 0,
            username_fragment: None,
        }
    }

    pub fn with_mid(mut self, sdp_mid: impl Into<String>, sdp_m_line_index: u16) -> Self {
        self.sdp_mid = Some(sdp_mid.into());
        self.sdp_m_line_index = sdp_m_line_index;
        self
    }
}

/// A signal the negotiation layer understands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalMessage {
    Description(SessionDescription),
    Candidate(IceCandidate),
    EndOfCandidates,
}

impl SignalMessage {
    /// Validate and normalize a wire payload
    ///
    /// Missing `sdpMLineIndex` becomes 0 and missing `sdpMid` /
    /// `usernameFragment` stay unset. An empty candidate string is the
    /// end-of-candidates marker; a candidate object with no candidate string
    /// at all is malformed.
    pub fn from_payload(payload: &SignalPayload) -> Result<Self, NegotiationError> {
        if let Some(description) = &payload.description {
            if description.payload.is_empty() {
                return Err(NegotiationError::MalformedSignal(format!(
                    "{} description without payload",
                    description.kind
                )));
            }
            return Ok(SignalMessage::Description(description.clone()));
        }

        let Some(candidate) = &payload.candidate else {
            return Err(NegotiationError::MalformedSignal(
                "signal carries neither description nor candidate".into(),
            ));
        };

        match candidate.candidate.as_deref() {
            None => Err(NegotiationError::MalformedSignal(
                "candidate without connectivity payload".into(),
            )),
            Some("") => Ok(SignalMessage::EndOfCandidates),
            Some(line) => Ok(SignalMessage::Candidate(IceCandidate {
                candidate: line.to_owned(),
                sdp_mid: candidate.sdp_mid.clone(),
                sdp_m_line_index: candidate.sdp_m_line_index.unwrap_or(0),
                username_fragment: candidate.username_fragment.clone(),
            })),
        }
    }

    /// Wire form, without a sender id
    pub fn to_payload(&self) -> SignalPayload {
        match self {
            SignalMessage::Description(description) => {
                SignalPayload::description(description.clone())
            }
            SignalMessage::Candidate(candidate) => SignalPayload::candidate(CandidatePayload {
                candidate: Some(candidate.candidate.clone()),
                sdp_mid: candidate.sdp_mid.clone(),
                sdp_m_line_index: Some(candidate.sdp_m_line_index),
                username_fragment: candidate.username_fragment.clone(),
            }),
            SignalMessage::EndOfCandidates => SignalPayload::candidate(CandidatePayload {
                candidate: Some(String::new()),
                ..Default::default()
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_defaults() {
        let payload = SignalPayload::candidate(CandidatePayload {
            candidate: Some("candidate:1 1 udp 2122260223 10.0.0.1 5000 typ host".into()),
            ..Default::default()
        });

        let SignalMessage::Candidate(candidate) = SignalMessage::from_payload(&payload).unwrap()
        else {
            panic!("expected candidate");
        };
        assert_eq!(candidate.sdp_m_line_index, 0);
        assert_eq!(candidate.sdp_mid, None);
        assert_eq!(candidate.username_fragment, None);
    }

    #[test]
    fn test_empty_candidate_is_end_marker() {
        let payload = SignalPayload::candidate(CandidatePayload {
            candidate: Some(String::new()),
            sdp_mid: Some("0".into()),
            ..Default::default()
        });

        assert_eq!(
            SignalMessage::from_payload(&payload).unwrap(),
            SignalMessage::EndOfCandidates
        );
    }

    #[test]
    fn test_candidate_without_payload_is_malformed() {
        let payload = SignalPayload::candidate(CandidatePayload {
            sdp_mid: Some("0".into()),
            ..Default::default()
        });

        assert!(matches!(
            SignalMessage::from_payload(&payload),
            Err(NegotiationError::MalformedSignal(_))
        ));
    }

    #[test]
    fn test_empty_signal_is_malformed() {
        assert!(matches!(
            SignalMessage::from_payload(&SignalPayload::default()),
            Err(NegotiationError::MalformedSignal(_))
        ));
    }

    #[test]
    fn test_description_without_payload_is_malformed() {
        let payload = SignalPayload::description(SessionDescription::offer(""));
        assert!(SignalMessage::from_payload(&payload).is_err());
    }

    #[test]
    fn test_to_payload_preserves_candidate() {
        let message = SignalMessage::Candidate(IceCandidate::new("candidate:2").with_mid("video", 1));
        let back = SignalMessage::from_payload(&message.to_payload()).unwrap();
        assert_eq!(back, message);

        let end = SignalMessage::EndOfCandidates.to_payload();
        assert_eq!(end.candidate.unwrap().candidate.as_deref(), Some(""));
    }
}

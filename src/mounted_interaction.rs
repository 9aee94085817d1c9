use crate::interaction::Interaction;
use crate::matching::{match_request, RequestMatch};
use crate::response_template::ResponseTemplate;
use crate::verification::Mismatch;
use crate::Request;

/// Given an [`Interaction`] of the contract, keep track of runtime information concerning it -
/// e.g. how many requests it matched.
pub(crate) struct MountedInteraction {
    pub(crate) interaction: Interaction,
    n_matched_requests: u64,
    /// Mismatches of the requests attributed to this interaction without matching it.
    partial_mismatches: Vec<Mismatch>,
    partially_matched_requests: Vec<Request>,
    /// The position occupied by this interaction within the parent
    /// [`MountedInteractionSet`](crate::interaction_set::MountedInteractionSet): ties between
    /// equally specific interactions go to the one registered first.
    pub(crate) position_in_set: usize,
    matched_requests: Vec<Request>,
}

impl MountedInteraction {
    pub(crate) fn new(interaction: Interaction, position_in_set: usize) -> Self {
        Self {
            interaction,
            n_matched_requests: 0,
            partial_mismatches: Vec::new(),
            partially_matched_requests: Vec::new(),
            position_in_set,
            matched_requests: Vec::new(),
        }
    }

    pub(crate) fn evaluate(&self, request: &Request) -> RequestMatch {
        match_request(self.interaction.request(), request)
    }

    pub(crate) fn record_match(&mut self, request: Request) {
        self.n_matched_requests += 1;
        self.matched_requests.push(request);
    }

    pub(crate) fn record_partial_match(&mut self, request: Request, mismatches: Vec<Mismatch>) {
        self.partial_mismatches.extend(mismatches);
        self.partially_matched_requests.push(request);
    }

    pub(crate) fn response_template(&self) -> ResponseTemplate {
        ResponseTemplate::from_spec(self.interaction.response())
    }

    /// Everything that went wrong for this interaction: the mismatches of the requests attributed
    /// to it or, if it never saw a request, a missing request.
    pub(crate) fn verify(&self) -> Vec<Mismatch> {
        let mut mismatches = self.partial_mismatches.clone();
        if self.n_matched_requests == 0 && mismatches.is_empty() {
            let request = self.interaction.request();
            mismatches.push(Mismatch::new(
                "$",
                format!("request:{} {}", request.method(), request.example_path()),
                None,
            ));
        }
        mismatches
    }

    /// The requests attributed to this interaction, whether they matched it or not.
    pub(crate) fn received_requests(&self) -> Vec<Request> {
        self.matched_requests
            .iter()
            .chain(&self.partially_matched_requests)
            .cloned()
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn matched_requests(&self) -> &[Request] {
        &self.matched_requests
    }
}

use crate::interaction::Interaction;
use crate::mounted_interaction::MountedInteraction;
use crate::request::BodyPrintLimit;
use crate::response_template::ResponseTemplate;
use crate::verification::{Mismatch, VerificationResult};
use crate::Request;
use http::Response;
use http_body_util::Full;
use hyper::body::Bytes;
use log::debug;

/// The interactions served by a running mock provider, together with what it received.
pub(crate) struct MountedInteractionSet {
    interactions: Vec<MountedInteraction>,
    /// Requests no interaction accounts for.
    unexpected_requests: Vec<Request>,
    body_print_limit: BodyPrintLimit,
}

impl MountedInteractionSet {
    pub(crate) fn new(interactions: &[Interaction], body_print_limit: BodyPrintLimit) -> Self {
        Self {
            interactions: interactions
                .iter()
                .cloned()
                .enumerate()
                .map(|(position, interaction)| MountedInteraction::new(interaction, position))
                .collect(),
            unexpected_requests: Vec::new(),
            body_print_limit,
        }
    }

    /// Find the interaction a request belongs to.
    ///
    /// Among the interactions matching the request, the most specific wins (ties go to the
    /// first registered). If none matches, the request is attributed to the interaction with the
    /// same method and path that has the fewest mismatches; failing that, it is unexpected.
    pub(crate) fn handle_request(&mut self, request: Request) -> Response<Full<Bytes>> {
        debug!("Handling request.");
        let outcomes: Vec<_> = self
            .interactions
            .iter()
            .map(|mounted| mounted.evaluate(&request))
            .collect();

        let best_match = outcomes
            .iter()
            .enumerate()
            .filter(|(_, outcome)| outcome.is_match())
            .max_by(|(a_index, a), (b_index, b)| {
                a.specificity
                    .cmp(&b.specificity)
                    .then_with(|| self.interactions[*b_index]
                        .position_in_set
                        .cmp(&self.interactions[*a_index].position_in_set))
            })
            .map(|(index, _)| index);
        if let Some(index) = best_match {
            let mounted = &mut self.interactions[index];
            debug!(
                "Request matched interaction `{}`.",
                mounted.interaction.description()
            );
            let response = mounted.response_template().generate_response();
            mounted.record_match(request);
            return response;
        }

        let partial_match = outcomes
            .into_iter()
            .enumerate()
            .filter(|(_, outcome)| outcome.method_and_path)
            .min_by_key(|(index, outcome)| (outcome.mismatches.len(), *index));
        match partial_match {
            Some((index, outcome)) => {
                debug!(
                    "Request did not match interaction `{}`:\n{}",
                    self.interactions[index].interaction.description(),
                    self.describe(&request)
                );
                let response = ResponseTemplate::mismatch(&outcome.mismatches).generate_response();
                self.interactions[index].record_partial_match(request, outcome.mismatches);
                response
            }
            None => {
                debug!("Got unexpected request:\n{}", self.describe(&request));
                let mismatch = unexpected(&request);
                self.unexpected_requests.push(request);
                ResponseTemplate::mismatch(&[mismatch]).generate_response()
            }
        }
    }

    fn describe(&self, request: &Request) -> String {
        let mut buffer = String::new();
        // Writing into a `String` cannot fail.
        let _ = request.print_with_limit(&mut buffer, self.body_print_limit);
        buffer
    }

    pub(crate) fn verify(&self) -> VerificationResult {
        let mut mismatches: Vec<Mismatch> = self
            .interactions
            .iter()
            .flat_map(MountedInteraction::verify)
            .collect();
        mismatches.extend(self.unexpected_requests.iter().map(unexpected));
        VerificationResult::from_mismatches(mismatches)
    }

    pub(crate) fn received_requests(&self) -> Vec<Request> {
        let mut requests: Vec<Request> = self
            .interactions
            .iter()
            .flat_map(MountedInteraction::received_requests)
            .collect();
        requests.extend(self.unexpected_requests.iter().cloned());
        requests
    }
}

fn unexpected(request: &Request) -> Mismatch {
    Mismatch::new("$", "no interaction", Some(request.summary()))
}

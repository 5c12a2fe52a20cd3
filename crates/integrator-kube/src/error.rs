//! Mapping of Kubernetes API failures onto operator errors.

use integrator_core::Error;

/// Translate a `kube` error, keeping the distinctions the reconcilers act on.
pub fn map_kube_error(err: kube::Error) -> Error {
    match &err {
        kube::Error::Api(response) if response.code == 409 => Error::Conflict(response.message.clone()),
        kube::Error::Api(response) if response.code == 404 => Error::NotFound(response.message.clone()),
        kube::Error::Api(response) if response.code == 422 || response.code == 400 => {
            Error::InvalidInput(response.message.clone())
        }
        kube::Error::Api(response) if response.code == 408 || response.code == 504 => {
            Error::Timeout(response.message.clone())
        }
        kube::Error::SerdeError(e) => Error::Internal(format!("decoding API response: {e}")),
        _ => Error::Internal(err.to_string()),
    }
}

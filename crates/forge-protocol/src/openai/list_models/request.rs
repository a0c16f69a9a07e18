/// `GET /v1/models` takes no body; the tenant is identified solely by the
/// client key carried in the request headers (handled upstream of this crate).
#[derive(Debug, Clone, Copy, Default)]
pub struct ListModelsRequest;

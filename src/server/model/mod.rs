use serde::Deserialize;

pub(crate) mod bill;
pub(crate) mod booking;
pub(crate) mod config;
pub(crate) mod event;
pub(crate) mod item;
pub(crate) mod order;
pub(crate) mod principal;

const DEFAULT_PAGE_SIZE: u8 = 20;
const MAX_PAGE_SIZE: u8 = 100;

#[derive(Debug, Default, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CommonRequestParams {
    pub page: Option<u32>,
    pub page_size: Option<u8>,
}

impl CommonRequestParams {
    /// (offset, limit) for the requested page
    pub fn window(&self) -> (usize, usize) {
        let size = self
            .page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE) as usize;
        let page = self.page.unwrap_or(0) as usize;
        (page * size, size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_defaults_and_clamps() {
        assert_eq!(CommonRequestParams::default().window(), (0, 20));
        let params = CommonRequestParams { page: Some(2), page_size: Some(250) };
        assert_eq!(params.window(), (200, 100));
        let params = CommonRequestParams { page: Some(1), page_size: Some(0) };
        assert_eq!(params.window(), (1, 1));
    }
}

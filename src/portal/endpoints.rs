use url::Url;

/// Routes of the portal, addressed through the `p` query parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// Site root, sets the session cookies
    Root,
    /// Cause-list landing page, embeds the token and the state dropdown
    CauseListPage,
    /// Case-status landing page, used as the captcha referer
    CaseStatusIndex,
    GetCaptcha,
    FillDistrict,
    FillComplex,
    SetData,
    FillCauseList,
    SubmitCauseList,
    SearchByCnr,
    SubmitCaseNo,
}

impl Endpoint {
    pub fn route(self) -> &'static str {
        match self {
            Self::Root => "",
            Self::CauseListPage => "cause_list/",
            Self::CaseStatusIndex => "casestatus/index",
            Self::GetCaptcha => "casestatus/getCaptcha",
            Self::FillDistrict => "casestatus/fillDistrict",
            Self::FillComplex => "casestatus/fillcomplex",
            Self::SetData => "casestatus/set_data",
            Self::FillCauseList => "cause_list/fillCauseList",
            Self::SubmitCauseList => "cause_list/submitCauseList",
            Self::SearchByCnr => "cnr_status/searchByCNR/",
            Self::SubmitCaseNo => "casestatus/submitCaseNo",
        }
    }

    /// Name used in logs and request metrics
    pub fn label(self) -> &'static str {
        match self {
            Self::Root => "root",
            other => other.route(),
        }
    }

    /// Absolute URL of this route under `base`, which must end with `/`
    pub fn url(self, base: &Url) -> Url {
        let mut url = base.clone();
        match self {
            Self::Root => url.set_query(None),
            _ => url.set_query(Some(&format!("p={}", self.route()))),
        }
        url
    }
}

/// Normalize a configured base URL so that joins stay below it
pub fn normalize_base(base: &str) -> Result<Url, url::ParseError> {
    Url::parse(&format!("{}/", base.trim().trim_end_matches('/')))
}

/// Legacy captcha image endpoint
pub fn securimage_url(base: &Url, sid: i64, token: Option<&str>) -> Url {
    let mut url = base
        .join("securimage/securimage_show.php")
        .unwrap_or_else(|_| base.clone());
    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("sid", &sid.to_string());
        if let Some(token) = token {
            pairs.append_pair("app_token", token);
        }
    }
    url
}

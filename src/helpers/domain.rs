use url::Url;

pub struct DomainParser;
impl DomainParser {
    pub fn get_domain(url: &Url) -> Option<addr::domain::Name<'_>> {
        url.domain().and_then(|x| addr::parse_domain_name(x).ok())
    }

    /// Get the root domain (the registrable part)
    pub fn get_domain_root(url: &Url) -> Option<&str> {
        Self::get_domain(url).and_then(|x| x.root())
    }

    /// Lowercased host with a leading `www.` removed.
    pub fn normalized_host(url: &Url) -> Option<String> {
        let host = url.host_str()?.to_ascii_lowercase();

        match host.strip_prefix("www.") {
            Some(rest) => Some(rest.to_string()),
            None => Some(host),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_www_and_lowercases() {
        let url = Url::parse("https://WWW.YouTube.com/watch?v=x").unwrap();

        assert_eq!(
            DomainParser::normalized_host(&url).as_deref(),
            Some("youtube.com")
        );
    }

    #[test]
    fn root_domain_drops_subdomains() {
        let url = Url::parse("https://blog.example.co.uk/post").unwrap();

        assert_eq!(DomainParser::get_domain_root(&url), Some("example.co.uk"));
    }

    #[test]
    fn ip_hosts_have_no_root() {
        let url = Url::parse("http://127.0.0.1:8080/").unwrap();

        assert_eq!(DomainParser::get_domain_root(&url), None);
        assert_eq!(
            DomainParser::normalized_host(&url).as_deref(),
            Some("127.0.0.1")
        );
    }
}

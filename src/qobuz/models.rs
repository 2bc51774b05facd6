//! Search candidates and parsing of Qobuz search responses.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A search hit offered to the user for queueing.
///
/// Artists carry `name` (and `photo` once cached); albums carry `title`,
/// `artist` and `year`; tracks carry `title`, `artist`, `album` and
/// `album_id`. `value` and `lookup` are display and free-text helpers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCandidate {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookup: Option<String>,
    #[serde(default)]
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
}

const URL_KEYS: &[&str] = &[
    "large",
    "extralarge",
    "extra_large",
    "hires",
    "medium",
    "small",
    "url",
    "href",
    "picture",
    "cover",
];

/// First non-blank URL found in the candidates, descending into image
/// objects and arrays.
pub fn pick_first_url(candidates: &[Option<&Value>]) -> String {
    candidates
        .iter()
        .flatten()
        .find_map(|value| first_url(value))
        .unwrap_or_default()
}

fn first_url(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => non_blank(s),
        Value::Object(map) => URL_KEYS
            .iter()
            .filter_map(|key| map.get(*key))
            .find_map(first_url),
        Value::Array(items) => items.iter().find_map(first_url),
        _ => None,
    }
}

/// First non-blank string, taking `name`, `title` or `display_name` of objects.
pub fn pick_first_str(candidates: &[Option<&Value>]) -> String {
    candidates
        .iter()
        .flatten()
        .find_map(|value| first_str(value))
        .unwrap_or_default()
}

fn first_str(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => non_blank(s),
        Value::Object(map) => ["name", "title", "display_name"]
            .iter()
            .filter_map(|key| map.get(*key))
            .find_map(|v| v.as_str().and_then(non_blank)),
        Value::Array(items) => items.iter().find_map(first_str),
        _ => None,
    }
}

fn non_blank(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Ids come back as numbers or strings depending on the endpoint.
fn id_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => non_blank(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn items<'a>(response: &'a Value, section: &str) -> &'a [Value] {
    response
        .get(section)
        .and_then(|s| s.get("items"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn joined(parts: &[&str], separator: &str) -> String {
    parts
        .iter()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(separator)
}

fn optional(s: String) -> Option<String> {
    (!s.is_empty()).then_some(s)
}

pub fn parse_artists(response: &Value) -> Vec<SearchCandidate> {
    items(response, "artists")
        .iter()
        .filter_map(|item| {
            let id = id_string(item.get("id"))?;
            let name = pick_first_str(&[item.get("name"), item.get("title")]);
            if name.is_empty() {
                return None;
            }
            Some(SearchCandidate {
                id,
                name: Some(name),
                image: pick_first_url(&[
                    item.get("image"),
                    item.get("images"),
                    item.get("picture"),
                ]),
                ..Default::default()
            })
        })
        .collect()
}

pub fn parse_albums(response: &Value) -> Vec<SearchCandidate> {
    items(response, "albums")
        .iter()
        .filter_map(|item| {
            let id = id_string(item.get("id"))?;
            let title = pick_first_str(&[item.get("title"), item.get("name")]);
            if title.is_empty() {
                return None;
            }
            let artist = pick_first_str(&[
                item.get("artist"),
                item.get("artists"),
                item.get("performer"),
            ]);
            let release_date = pick_first_str(&[
                item.get("release_date_original"),
                item.get("release_date"),
            ]);
            let year = release_date
                .get(..4)
                .filter(|y| y.chars().all(|c| c.is_ascii_digit()))
                .map(str::to_string);

            Some(SearchCandidate {
                id,
                value: Some(joined(&[artist.as_str(), title.as_str()], " - ")),
                lookup: Some(joined(&[title.as_str(), artist.as_str()], " ")),
                image: pick_first_url(&[
                    item.get("image"),
                    item.get("images"),
                    item.get("cover"),
                    item.get("picture"),
                ]),
                title: Some(title),
                artist: optional(artist),
                year,
                ..Default::default()
            })
        })
        .collect()
}

pub fn parse_tracks(response: &Value) -> Vec<SearchCandidate> {
    items(response, "tracks")
        .iter()
        .filter_map(|item| {
            let id = id_string(item.get("id"))?;
            let title = pick_first_str(&[item.get("title"), item.get("name")]);
            if title.is_empty() {
                return None;
            }
            let album_obj = item.get("album").filter(|a| a.is_object());
            let album = pick_first_str(&[
                album_obj
                    .and_then(|a| a.get("title"))
                    .or_else(|| item.get("album")),
                item.get("album_title"),
            ]);
            let album_id = id_string(album_obj.and_then(|a| a.get("id")));
            let artist = pick_first_str(&[
                item.get("performer"),
                item.get("artist"),
                item.get("contributors"),
            ]);

            let base = joined(&[artist.as_str(), title.as_str()], " - ");
            let value = if album.is_empty() {
                base
            } else {
                format!("{} ({})", base, album)
            };

            Some(SearchCandidate {
                id,
                value: Some(value),
                lookup: Some(joined(&[title.as_str(), artist.as_str(), album.as_str()], " ")),
                image: pick_first_url(&[
                    item.get("image"),
                    item.get("images"),
                    item.get("cover"),
                    item.get("picture"),
                    album_obj.and_then(|a| a.get("image")),
                    album_obj.and_then(|a| a.get("images")),
                    album_obj.and_then(|a| a.get("cover")),
                    album_obj.and_then(|a| a.get("picture")),
                ]),
                title: Some(title),
                artist: optional(artist),
                album: optional(album),
                album_id,
                ..Default::default()
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pick_first_url_prefers_large() {
        let image = json!({ "small": "s.jpg", "large": " l.jpg " });
        assert_eq!(pick_first_url(&[None, Some(&image)]), "l.jpg");

        let nested = json!([{ "thumbnail": "x" }, { "medium": "m.jpg" }]);
        assert_eq!(pick_first_url(&[Some(&nested)]), "m.jpg");
        assert_eq!(pick_first_url(&[Some(&json!(""))]), "");
    }

    #[test]
    fn test_pick_first_str() {
        let artist = json!({ "name": "Owl City", "id": 1 });
        assert_eq!(pick_first_str(&[Some(&json!("  ")), Some(&artist)]), "Owl City");
        assert_eq!(pick_first_str(&[Some(&json!([{ "title": "T" }]))]), "T");
        assert_eq!(pick_first_str(&[Some(&json!(5))]), "");
    }

    #[test]
    fn test_parse_artists() {
        let response = json!({
            "artists": { "items": [
                { "id": 123, "name": "Test Artist", "image": { "large": "https://img/123.jpg" } },
                { "id": 124 },
                { "name": "No Id" }
            ]}
        });

        let artists = parse_artists(&response);
        assert_eq!(artists.len(), 1);
        assert_eq!(artists[0].id, "123");
        assert_eq!(artists[0].name.as_deref(), Some("Test Artist"));
        assert_eq!(artists[0].image, "https://img/123.jpg");
        assert_eq!(artists[0].photo, None);
    }

    #[test]
    fn test_parse_albums() {
        let response = json!({
            "albums": { "items": [{
                "id": "0886443927087",
                "title": "Random Access Memories",
                "artist": { "name": "Daft Punk" },
                "release_date_original": "2013-05-17",
                "image": { "small": "s.jpg" }
            }]}
        });

        let albums = parse_albums(&response);
        assert_eq!(albums.len(), 1);
        let album = &albums[0];
        assert_eq!(album.artist.as_deref(), Some("Daft Punk"));
        assert_eq!(album.year.as_deref(), Some("2013"));
        assert_eq!(
            album.value.as_deref(),
            Some("Daft Punk - Random Access Memories")
        );
        assert_eq!(
            album.lookup.as_deref(),
            Some("Random Access Memories Daft Punk")
        );
        assert_eq!(album.image, "s.jpg");
    }

    #[test]
    fn test_parse_album_without_artist_or_date() {
        let response = json!({ "albums": { "items": [{ "id": 1, "title": "Alone" }] } });
        let album = &parse_albums(&response)[0];
        assert_eq!(album.value.as_deref(), Some("Alone"));
        assert_eq!(album.artist, None);
        assert_eq!(album.year, None);
    }

    #[test]
    fn test_parse_tracks() {
        let response = json!({
            "tracks": { "items": [{
                "id": 808,
                "title": "Get Lucky",
                "performer": { "name": "Daft Punk" },
                "album": { "id": "77", "title": "RAM", "image": { "large": "ram.jpg" } }
            }]}
        });

        let tracks = parse_tracks(&response);
        assert_eq!(tracks.len(), 1);
        let track = &tracks[0];
        assert_eq!(track.id, "808");
        assert_eq!(track.album.as_deref(), Some("RAM"));
        assert_eq!(track.album_id.as_deref(), Some("77"));
        assert_eq!(track.value.as_deref(), Some("Daft Punk - Get Lucky (RAM)"));
        assert_eq!(track.lookup.as_deref(), Some("Get Lucky Daft Punk RAM"));
        assert_eq!(track.image, "ram.jpg");
    }

    #[test]
    fn test_missing_sections_yield_nothing() {
        let response = json!({ "albums": null });
        assert!(parse_albums(&response).is_empty());
        assert!(parse_tracks(&response).is_empty());
        assert!(parse_artists(&json!([])).is_empty());
    }
}

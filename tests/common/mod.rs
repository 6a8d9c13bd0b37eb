#![allow(dead_code)]

use encoding_rs::WINDOWS_1252;
use std::path::PathBuf;

pub fn fixture_path(parts: &[&str]) -> PathBuf {
    let mut p = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    p.push("tests");
    p.push("fixtures");
    for part in parts {
        p.push(part);
    }
    p
}

#[derive(Debug, Clone, Default)]
pub struct Picture {
    pub path: String,
    pub data: Vec<u8>,
}

impl Picture {
    pub fn new(path: &str, data: Vec<u8>) -> Self {
        Self {
            path: path.to_string(),
            data,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Extra {
    pub checked: bool,
    pub tag: String,
    pub title: String,
    pub category: String,
    pub picture: Option<Picture>,
}

#[derive(Debug, Clone, Default)]
pub struct CustomDef {
    pub tag: String,
    pub name: String,
    pub field_type: String,
    pub default_value: String,
    pub list_values: Vec<String>,
}

impl CustomDef {
    pub fn new(tag: &str, name: &str, field_type: &str) -> Self {
        Self {
            tag: tag.to_string(),
            name: name.to_string(),
            field_type: field_type.to_string(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Movie {
    pub number: i32,
    pub date_added: i32,
    pub date_watched: i32,
    pub user_rating: i32,
    pub rating: i32,
    pub year: i32,
    pub length: i32,
    pub disks: i32,
    pub color_tag: i32,
    pub checked: bool,
    pub media_type: String,
    pub original_title: String,
    pub translated_title: String,
    pub director: String,
    pub writer: String,
    pub actors: String,
    pub picture: Option<Picture>,
    pub custom: Vec<String>,
    pub extras: Vec<Extra>,
}

impl Movie {
    pub fn titled(number: i32, title: &str) -> Self {
        Self {
            number,
            original_title: title.to_string(),
            year: 1970 + number,
            rating: 7,
            checked: true,
            ..Self::default()
        }
    }
}

/// Writes catalogs byte by byte, the way Ant Movie Catalog lays them out.
pub struct CatalogBuilder {
    version: u32,
    out: Vec<u8>,
}

impl CatalogBuilder {
    pub fn new(major: u32, minor: u32) -> Self {
        let mut out = format!(" AMC_{}.{} Ant Movie Catalog {}.{}.0.0", major, minor, major, minor)
            .into_bytes();
        out.resize(65, 0);
        Self {
            version: major * 10 + minor,
            out,
        }
    }

    /// A 65-byte signature block with arbitrary content.
    pub fn with_signature(signature: &str, version: u32) -> Self {
        let mut out = signature.as_bytes().to_vec();
        out.resize(65, 0);
        Self { version, out }
    }

    pub fn int(&mut self, value: i32) -> &mut Self {
        self.out.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn boolean(&mut self, value: bool) -> &mut Self {
        self.out.push(value as u8);
        self
    }

    pub fn text(&mut self, value: &str) -> &mut Self {
        let (bytes, _, _) = WINDOWS_1252.encode(value);
        self.raw_text(&bytes)
    }

    pub fn bytes(&mut self, data: &[u8]) -> &mut Self {
        self.out.extend_from_slice(data);
        self
    }

    pub fn raw_text(&mut self, bytes: &[u8]) -> &mut Self {
        self.int(bytes.len() as i32);
        self.out.extend_from_slice(bytes);
        self
    }

    pub fn picture(&mut self, picture: Option<&Picture>) -> &mut Self {
        match picture {
            Some(p) => {
                self.text(&p.path);
                self.int(p.data.len() as i32);
                self.out.extend_from_slice(&p.data);
            }
            None => {
                self.text("");
                self.int(0);
            }
        }
        self
    }

    pub fn properties(
        &mut self,
        owner: &str,
        mail: &str,
        site: &str,
        description: &str,
    ) -> &mut Self {
        self.text(owner).text(mail);
        if self.version < 35 {
            self.text("123456");
        }
        self.text(site).text(description)
    }

    pub fn custom_fields(&mut self, defs: &[CustomDef]) -> &mut Self {
        if self.version < 40 {
            return self;
        }
        let v = self.version;
        self.text("columns").text("gui");
        self.int(defs.len() as i32);
        for def in defs {
            self.text(&def.tag).text(&def.name);
            if v >= 41 {
                self.text("");
            }
            self.text(&def.field_type).text(&def.default_value);
            if v >= 41 {
                self.text("");
            }
            self.boolean(false);
            if v >= 41 {
                self.int(0x2C).boolean(false).boolean(false);
            }
            self.boolean(false);
            self.text("");
            if def.field_type == "ftList" {
                self.int(def.list_values.len() as i32);
                for value in &def.list_values {
                    self.text(value);
                }
                if v >= 41 {
                    self.boolean(true).boolean(false).boolean(true).boolean(false);
                }
            }
        }
        self
    }

    pub fn movie(&mut self, m: &Movie) -> &mut Self {
        let v = self.version;
        self.int(m.number).int(m.date_added);
        if v >= 42 {
            self.int(m.date_watched).int(m.user_rating);
        }
        self.int(m.rating).int(m.year).int(m.length).int(0).int(0).int(m.disks);
        if v >= 41 {
            self.int(m.color_tag);
        }
        self.boolean(m.checked);
        self.text("DVD");
        if v >= 33 {
            self.text(&m.media_type).text("");
        }
        self.text("");
        self.text(&m.original_title).text(&m.translated_title);
        self.text(&m.director).text("");
        if v >= 42 {
            self.text(&m.writer).text("");
        }
        self.text("").text("");
        if v >= 42 {
            self.text("");
        }
        self.text(&m.actors).text("").text("").text("");
        if v >= 42 {
            self.text("");
        }
        for _ in 0..7 {
            self.text("");
        }
        self.picture(m.picture.as_ref());
        if v >= 40 {
            for value in &m.custom {
                self.text(value);
            }
        }
        if v >= 42 {
            self.int(m.extras.len() as i32);
            for extra in &m.extras {
                self.boolean(extra.checked);
                self.text(&extra.tag).text(&extra.title).text(&extra.category);
                for _ in 0..4 {
                    self.text("");
                }
                self.picture(extra.picture.as_ref());
            }
        }
        self
    }

    pub fn len(&self) -> usize {
        self.out.len()
    }

    pub fn finish(&self) -> Vec<u8> {
        self.out.clone()
    }
}

/// A 4.2 catalog with three movies; the second one carries a 50-byte cover.
pub fn three_movie_catalog() -> Vec<u8> {
    let mut b = CatalogBuilder::new(4, 2);
    b.properties("Ann Owner", "ann@example.org", "https://example.org", "My movies");
    b.custom_fields(&[]);
    b.movie(&Movie::titled(1, "Metropolis"));
    b.movie(&Movie {
        picture: Some(Picture::new("covers\\Alien.PNG", cover_bytes(50))),
        ..Movie::titled(2, "Alien")
    });
    b.movie(&Movie::titled(3, "Brazil"));
    b.finish()
}

pub fn cover_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 251) as u8).collect()
}

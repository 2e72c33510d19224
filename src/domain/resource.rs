use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Article,
    Video,
    Podcast,
}

impl ResourceKind {
    /// Parses a kind filter. `None` means "all kinds".
    pub fn parse_filter(value: &str) -> Result<Option<Self>, String> {
        match value {
            "" | "all" => Ok(None),
            "article" | "articles" => Ok(Some(Self::Article)),
            "video" | "videos" => Ok(Some(Self::Video)),
            "podcast" | "podcasts" => Ok(Some(Self::Podcast)),
            other => Err(format!("unknown resource kind: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Resource {
    pub id: u32,
    pub title: &'static str,
    pub description: &'static str,
    pub kind: ResourceKind,
    pub author: &'static str,
    pub duration: &'static str,
    pub rating: f32,
    pub image_url: &'static str,
    pub url: &'static str,
    pub featured: bool,
}

pub const CATALOG: &[Resource] = &[
    Resource {
        id: 1,
        title: "The Science of Body Positivity: How Self-Acceptance Improves Mental Health",
        description: "Explore the psychological research behind body positivity and its impact on overall well-being and mental health.",
        kind: ResourceKind::Article,
        author: "Dr. Sarah Williams",
        duration: "8 min read",
        rating: 4.8,
        image_url: "https://images.unsplash.com/photo-1559757148-5c350d0d3c56?w=400&h=250&fit=crop",
        url: "#",
        featured: true,
    },
    Resource {
        id: 2,
        title: "Body Neutrality vs Body Positivity: Finding Your Path",
        description: "Understanding the difference between body neutrality and body positivity, and how to choose the approach that works for you.",
        kind: ResourceKind::Video,
        author: "Maya Johnson",
        duration: "12 min watch",
        rating: 4.9,
        image_url: "https://images.unsplash.com/photo-1571019613454-1cb2f99b2d8b?w=400&h=250&fit=crop",
        url: "#",
        featured: false,
    },
    Resource {
        id: 3,
        title: "Mindful Eating and Body Acceptance",
        description: "Learn how mindful eating practices can help you develop a healthier relationship with food and your body.",
        kind: ResourceKind::Podcast,
        author: "The Body Love Podcast",
        duration: "45 min listen",
        rating: 4.7,
        image_url: "https://images.unsplash.com/photo-1506905925346-21bda4d32df4?w=400&h=250&fit=crop",
        url: "#",
        featured: false,
    },
    Resource {
        id: 4,
        title: "Overcoming Negative Self-Talk: A Practical Guide",
        description: "Practical strategies and techniques to identify, challenge, and replace negative self-talk with compassionate inner dialogue.",
        kind: ResourceKind::Article,
        author: "Dr. Michael Chen",
        duration: "6 min read",
        rating: 4.6,
        image_url: "https://images.unsplash.com/photo-1544005313-94ddf0286df2?w=400&h=250&fit=crop",
        url: "#",
        featured: false,
    },
    Resource {
        id: 5,
        title: "Building Confidence Through Movement",
        description: "Discover how different forms of movement and exercise can boost your confidence and improve your relationship with your body.",
        kind: ResourceKind::Video,
        author: "FitJoy Movement",
        duration: "15 min watch",
        rating: 4.8,
        image_url: "https://images.unsplash.com/photo-1594736797933-d0401ba2fe65?w=400&h=250&fit=crop",
        url: "#",
        featured: true,
    },
    Resource {
        id: 6,
        title: "The Role of Social Media in Body Image",
        description: "An in-depth discussion about how social media affects body image and strategies for creating a positive online environment.",
        kind: ResourceKind::Podcast,
        author: "Digital Wellness Show",
        duration: "38 min listen",
        rating: 4.5,
        image_url: "https://images.unsplash.com/photo-1573496359142-b8d87734a5a2?w=400&h=250&fit=crop",
        url: "#",
        featured: false,
    },
];

pub fn filter(kind: Option<ResourceKind>, query: &str) -> Vec<&'static Resource> {
    let query = query.trim().to_lowercase();
    CATALOG
        .iter()
        .filter(|resource| kind.map_or(true, |kind| resource.kind == kind))
        .filter(|resource| {
            query.is_empty()
                || resource.title.to_lowercase().contains(&query)
                || resource.description.to_lowercase().contains(&query)
        })
        .collect()
}
